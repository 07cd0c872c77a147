//! Courier Domain - Core business types
//!
//! This crate defines the domain model for the Courier API client:
//! requests, auth configuration, cookies, environments, tabs and the
//! message types exchanged with the script sandbox.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod collection;
pub mod cookie;
pub mod environment;
pub mod error;
pub mod history;
pub mod id;
pub mod request;
pub mod response;
pub mod sandbox;
pub mod settings;
pub mod snapshot;
pub mod state;
pub mod tab;

pub use auth::{ApiKeyLocation, AuthConfig, ResolvedAuth};
pub use collection::{Collection, SavedRequest};
pub use cookie::{Cookie, CookieJar};
pub use environment::{Environment, EnvironmentVariable, VariableSnapshot};
pub use error::{DomainError, DomainResult};
pub use history::{HistoryEntry, RequestHistory};
pub use id::{CollectionId, EnvironmentId, TabId, generate_id};
pub use request::{
    ApiRequest, FormField, Header, HttpMethod, MultipartField, QueryParam, RequestBody,
};
pub use response::{ResponseBody, ResponseSpec, StatusCode};
pub use sandbox::{
    Assertion, Expr, Instruction, MAX_NESTING, PathSegment, ResponseSnapshot, SandboxContext,
    SandboxRequest, SandboxResult, Script, TestResult, TestStatus, nesting_depth,
};
pub use settings::Settings;
pub use snapshot::PersistedState;
pub use state::{FailureCause, PipelineStage, RequestErrorKind, RequestState};
pub use tab::Tab;
