pub mod design_style;
pub mod designs_hooks;
pub mod designs_schema;
pub mod designs_service;
pub mod designs_shared;

pub use designs_schema::DesignStyles;
pub use designs_service::DesignsService;
