//! Store change notifications

use courier_domain::{CollectionId, EnvironmentId, PipelineStage, TabId};

/// A change published by the [`Store`](super::Store).
///
/// Events carry ids only; subscribers read the current state back from
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// A tab was created.
    TabAdded(TabId),
    /// A tab was closed.
    TabClosed(TabId),
    /// The active tab changed.
    TabActivated(TabId),
    /// A tab's request, title or environment changed.
    TabUpdated(TabId),
    /// A tab's pipeline run moved to a new stage.
    TabStage(TabId, PipelineStage),
    /// A tab received a response or an error.
    TabCompleted(TabId),
    /// An environment was added, edited or removed.
    EnvironmentChanged(EnvironmentId),
    /// A collection was added, edited or removed.
    CollectionChanged(CollectionId),
    /// The cookie jar changed.
    CookiesChanged,
    /// History gained or lost entries.
    HistoryChanged,
    /// Settings changed, including the active environment.
    SettingsChanged,
}
