// Application layer - Use case interactors

pub mod catalog_interactor;
pub mod clip_interactor;
pub mod container;
pub mod session;

// Re-export interactors
pub use catalog_interactor::FormatCatalog;
pub use clip_interactor::{ClipHandle, ClipInteractor};
pub use container::AppContainer;
pub use session::ClipSession;
