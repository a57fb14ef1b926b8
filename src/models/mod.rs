/// Implements `Display` and case-insensitive `FromStr` for a fieldless enum
/// stored as lowercase text.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($ty::$variant => write!(f, $text),)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(format!(
                        "Invalid {} '{}'. Valid options: {}",
                        stringify!($ty),
                        s,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

pub(crate) use text_enum;

mod budget;
mod collection;
mod employee;
mod invoice;
mod leave_request;
mod product;
mod quiz;
mod student;
mod teacher;
mod transaction;
mod vendor;

pub use budget::Budget;
pub use collection::{new_id, Collection, Entity};
pub use employee::{Employee, EmployeeStatus};
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus};
pub use leave_request::{LeaveRequest, LeaveStatus, LeaveType};
pub use product::Product;
pub use quiz::{Question, Quiz, QuizScore, QuizStatus};
pub use student::{Student, StudentStatus};
pub use teacher::Teacher;
pub use transaction::{Transaction, TransactionKind};
pub use vendor::Vendor;

