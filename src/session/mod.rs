//! Session orchestration: from a tool request to sequenced protocol calls.
//!
//! # Architecture
//!
//! - `registry`: which server has which file open, and how many invocations
//!   rely on it
//! - `manager`: one server per `(language, workspace root)`, started or reused
//! - `documents`: opens and closes documents on the owning server
//! - `dispatch`: maps an [`Operation`] to its protocol call
//! - `hierarchy`: incoming/outgoing call resolution
//! - `facade`: [`Orchestrator`], the entry point sequencing all of the above
//! - `request`: request and result types
//!
//! # Usage
//!
//! ```ignore
//! use kadabra_conductor::session::{Operation, OperationRequest, Orchestrator, TaskContext};
//!
//! let orchestrator = Orchestrator::new(transport, catalog, workspace);
//! let request = OperationRequest::new(Operation::Hover, "src/lib.rs", 12, 8);
//! let result = orchestrator.execute(&request, &TaskContext::new("main")).await;
//! println!("{}", result.message);
//! ```

pub mod dispatch;
pub mod documents;
pub mod facade;
pub mod hierarchy;
pub mod manager;
pub mod registry;
pub mod request;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::RequestDispatcher;
pub use documents::{DocumentLease, DocumentSynchronizer};
pub use facade::Orchestrator;
pub use hierarchy::CallHierarchyWalker;
pub use manager::{ServerConnection, ServerLease, SessionManager};
pub use registry::ConnectionRegistry;
pub use request::{Operation, OperationData, OperationRequest, OperationResult, TaskContext};
