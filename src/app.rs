//! Composition root: one pool, one outbox, one repository per entity.

use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::db::{
    self, BudgetDao, EmployeeDao, InvoiceDao, LeaveRequestDao, Outbox, ProductDao, QuizDao,
    StudentDao, TeacherDao, TransactionDao, VendorDao,
};
use crate::models::{
    Budget, Employee, Invoice, LeaveRequest, Product, Quiz, Student, Teacher, Transaction, Vendor,
};
use crate::repository::{Repository, SyncSignal, SyncTarget};
use crate::sync::{RemoteStore, RetryPolicy, SyncWorker};
use crate::viewmodel::{
    ExamViewModel, FinanceViewModel, HrViewModel, InventoryViewModel, StudentViewModel,
    TeacherViewModel,
};

pub type TransactionRepository = Repository<Transaction, TransactionDao>;
pub type InvoiceRepository = Repository<Invoice, InvoiceDao>;
pub type BudgetRepository = Repository<Budget, BudgetDao>;
pub type EmployeeRepository = Repository<Employee, EmployeeDao>;
pub type LeaveRequestRepository = Repository<LeaveRequest, LeaveRequestDao>;
pub type ProductRepository = Repository<Product, ProductDao>;
pub type VendorRepository = Repository<Vendor, VendorDao>;
pub type QuizRepository = Repository<Quiz, QuizDao>;
pub type StudentRepository = Repository<Student, StudentDao>;
pub type TeacherRepository = Repository<Teacher, TeacherDao>;

#[derive(Clone)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub outbox: Outbox,
    pub signal: SyncSignal,
    pub transactions: Arc<TransactionRepository>,
    pub invoices: Arc<InvoiceRepository>,
    pub budgets: Arc<BudgetRepository>,
    pub employees: Arc<EmployeeRepository>,
    pub leave_requests: Arc<LeaveRequestRepository>,
    pub products: Arc<ProductRepository>,
    pub vendors: Arc<VendorRepository>,
    pub quizzes: Arc<QuizRepository>,
    pub students: Arc<StudentRepository>,
    pub teachers: Arc<TeacherRepository>,
}

impl AppContext {
    /// Open (creating and migrating if needed) the cache at `database_path`.
    pub async fn open(database_path: &Path) -> Result<Self, sqlx::Error> {
        let pool = db::init_db(database_path).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        let outbox = Outbox::new(pool.clone());
        let signal = SyncSignal::new();

        Self {
            transactions: Arc::new(Repository::new(
                TransactionDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            invoices: Arc::new(Repository::new(
                InvoiceDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            budgets: Arc::new(Repository::new(
                BudgetDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            employees: Arc::new(Repository::new(
                EmployeeDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            leave_requests: Arc::new(Repository::new(
                LeaveRequestDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            products: Arc::new(Repository::new(
                ProductDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            vendors: Arc::new(Repository::new(
                VendorDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            quizzes: Arc::new(Repository::new(
                QuizDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            students: Arc::new(Repository::new(
                StudentDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            teachers: Arc::new(Repository::new(
                TeacherDao::new(pool.clone()),
                outbox.clone(),
                signal.clone(),
            )),
            pool,
            outbox,
            signal,
        }
    }

    /// Every repository, in pull order.
    pub fn sync_targets(&self) -> Vec<Arc<dyn SyncTarget>> {
        vec![
            self.transactions.clone() as Arc<dyn SyncTarget>,
            self.invoices.clone(),
            self.budgets.clone(),
            self.employees.clone(),
            self.leave_requests.clone(),
            self.products.clone(),
            self.vendors.clone(),
            self.quizzes.clone(),
            self.students.clone(),
            self.teachers.clone(),
        ]
    }

    pub fn sync_worker(&self, remote: Arc<dyn RemoteStore>, config: &SyncConfig) -> SyncWorker {
        SyncWorker::new(
            self.outbox.clone(),
            remote,
            self.sync_targets(),
            self.signal.clone(),
        )
        .with_retry(RetryPolicy::from_config(config))
        .with_interval(config.interval())
    }

    pub fn finance(&self) -> FinanceViewModel {
        FinanceViewModel::new(
            self.transactions.clone(),
            self.invoices.clone(),
            self.budgets.clone(),
        )
    }

    pub fn hr(&self) -> HrViewModel {
        HrViewModel::new(self.employees.clone(), self.leave_requests.clone())
    }

    pub fn inventory(&self) -> InventoryViewModel {
        InventoryViewModel::new(self.products.clone(), self.vendors.clone())
    }

    pub fn exam(&self) -> ExamViewModel {
        ExamViewModel::new(self.quizzes.clone())
    }

    pub fn student(&self) -> StudentViewModel {
        StudentViewModel::new(self.students.clone())
    }

    pub fn teacher(&self) -> TeacherViewModel {
        TeacherViewModel::new(self.teachers.clone(), self.employees.clone())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// Context over a fresh database. Keep the `TempDir` alive for the test.
    pub async fn test_context() -> (AppContext, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = AppContext::open(&temp_dir.path().join("erp.db")).await.unwrap();
        (ctx, temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::test_context;
    use crate::models::Collection;

    #[tokio::test]
    async fn test_every_collection_is_a_sync_target() {
        let (ctx, _temp) = test_context().await;
        let mut collections: Vec<Collection> =
            ctx.sync_targets().iter().map(|t| t.collection()).collect();
        collections.sort();
        assert_eq!(collections, Collection::ALL.to_vec());
    }
}
