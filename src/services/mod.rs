pub mod enrichment;
pub mod sale_service;
