//! Business logic services for the Garment Production Management Platform

pub mod ledger;
pub mod norm_category;
pub mod planning;
pub mod production;
pub mod receipts;
pub mod reports;
pub mod rollup;

pub use ledger::LedgerService;
pub use norm_category::NormCategoryService;
pub use planning::PlanningService;
pub use production::ProductionService;
pub use receipts::ReceiptService;
pub use reports::ReportService;
