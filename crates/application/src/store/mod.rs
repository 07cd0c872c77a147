//! Tab and environment store
//!
//! The [`Store`] is the single owner of tabs, environments, collections,
//! history, cookies and settings. It is injected where it is needed rather
//! than reached through a global. Every mutation goes through a command
//! method and is announced on a broadcast channel.

mod events;
mod send;

use courier_domain::{
    ApiRequest, Collection, CollectionId, Cookie, CookieJar, Environment, EnvironmentId,
    HistoryEntry, PersistedState, RequestHistory, Settings, Tab, TabId, VariableSnapshot,
};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::{ApplicationError, ApplicationResult};

pub use events::StoreEvent;
pub(crate) use send::{CommitData, SendSnapshot};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
struct StoreState {
    tabs: Vec<Tab>,
    active_tab: TabId,
    environments: Vec<Environment>,
    collections: Vec<Collection>,
    history: RequestHistory,
    cookies: CookieJar,
    settings: Settings,
}

impl StoreState {
    fn tab_mut(&mut self, id: TabId) -> ApplicationResult<&mut Tab> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ApplicationError::not_found("tab", id))
    }

    fn environment_mut(&mut self, id: EnvironmentId) -> ApplicationResult<&mut Environment> {
        self.environments
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ApplicationError::not_found("environment", id))
    }

    fn collection_mut(&mut self, id: CollectionId) -> ApplicationResult<&mut Collection> {
        self.collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ApplicationError::not_found("collection", id))
    }

    /// Effective environment for a tab: its override, else the active one.
    fn environment_for(&self, tab: &Tab) -> Option<&Environment> {
        let id = tab
            .environment_id
            .or(self.settings.active_environment_id)?;
        self.environments.iter().find(|e| e.id == id)
    }

    fn push_tab(&mut self, tab: Tab) -> TabId {
        let id = tab.id;
        self.tabs.push(tab);
        self.active_tab = id;
        id
    }
}

/// Owner of all client state.
pub struct Store {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates a store with default settings and one empty tab.
    #[must_use]
    pub fn new() -> Self {
        Self::from_persisted(PersistedState::default())
    }

    /// Rebuilds a store from a persisted snapshot. One fresh tab is opened
    /// since tabs are not persisted.
    #[must_use]
    pub fn from_persisted(persisted: PersistedState) -> Self {
        let PersistedState {
            environments,
            collections,
            mut history,
            cookies,
            mut settings,
            ..
        } = persisted;

        history.set_max_entries(settings.max_history_size);
        if let Some(active) = settings.active_environment_id
            && !environments.iter().any(|e| e.id == active)
        {
            settings.active_environment_id = None;
        }

        let tab = Tab::default();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(StoreState {
                active_tab: tab.id,
                tabs: vec![tab],
                environments,
                collections,
                history,
                cookies,
                settings,
            }),
            events,
        }
    }

    /// Returns the snapshot to persist.
    #[must_use]
    pub fn persisted(&self) -> PersistedState {
        let state = self.state.read();
        PersistedState {
            version: PersistedState::CURRENT_VERSION,
            environments: state.environments.clone(),
            collections: state.collections.clone(),
            history: state.history.clone(),
            cookies: state.cookies.clone(),
            settings: state.settings.clone(),
        }
    }

    /// Subscribes to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    // ---- tabs ----

    /// Opens a new tab for `request` and makes it active.
    pub fn add_tab(&self, request: ApiRequest) -> TabId {
        let id = self.state.write().push_tab(Tab::new(request));
        debug!(tab = %id, "tab added");
        self.emit(StoreEvent::TabAdded(id));
        self.emit(StoreEvent::TabActivated(id));
        id
    }

    /// Opens an empty tab and makes it active.
    pub fn new_tab(&self) -> TabId {
        let id = self.state.write().push_tab(Tab::default());
        debug!(tab = %id, "tab added");
        self.emit(StoreEvent::TabAdded(id));
        self.emit(StoreEvent::TabActivated(id));
        id
    }

    /// Closes a tab. Closing the last tab opens a fresh one, and closing
    /// the active tab activates its neighbour.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown tab.
    pub fn close_tab(&self, id: TabId) -> ApplicationResult<()> {
        let (replacement, activated) = {
            let mut state = self.state.write();
            let index = state
                .tabs
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| ApplicationError::not_found("tab", id))?;
            state.tabs.remove(index);

            let mut replacement = None;
            if state.tabs.is_empty() {
                replacement = Some(state.push_tab(Tab::default()));
            }
            let mut activated = None;
            if state.active_tab == id {
                let next = state.tabs[index.min(state.tabs.len() - 1)].id;
                state.active_tab = next;
                activated = Some(next);
            }
            (replacement, activated)
        };

        debug!(tab = %id, "tab closed");
        self.emit(StoreEvent::TabClosed(id));
        if let Some(new_id) = replacement {
            self.emit(StoreEvent::TabAdded(new_id));
        }
        if let Some(active) = activated {
            self.emit(StoreEvent::TabActivated(active));
        }
        Ok(())
    }

    /// Makes a tab the active one.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown tab.
    pub fn set_active_tab(&self, id: TabId) -> ApplicationResult<()> {
        {
            let mut state = self.state.write();
            state.tab_mut(id)?;
            state.active_tab = id;
        }
        self.emit(StoreEvent::TabActivated(id));
        Ok(())
    }

    /// Returns the active tab id.
    #[must_use]
    pub fn active_tab_id(&self) -> TabId {
        self.state.read().active_tab
    }

    /// Returns a copy of the active tab.
    #[must_use]
    pub fn active_tab(&self) -> Option<Tab> {
        let state = self.state.read();
        state.tabs.iter().find(|t| t.id == state.active_tab).cloned()
    }

    /// Returns a copy of a tab.
    #[must_use]
    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.state.read().tabs.iter().find(|t| t.id == id).cloned()
    }

    /// Returns copies of all tabs in display order.
    #[must_use]
    pub fn tabs(&self) -> Vec<Tab> {
        self.state.read().tabs.clone()
    }

    /// Replaces a tab's request. The response of the previous send stays.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown tab.
    pub fn update_tab_request(&self, id: TabId, request: ApiRequest) -> ApplicationResult<()> {
        self.state.write().tab_mut(id)?.request = request;
        self.emit(StoreEvent::TabUpdated(id));
        Ok(())
    }

    /// Renames a tab.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown tab.
    pub fn rename_tab(&self, id: TabId, title: impl Into<String>) -> ApplicationResult<()> {
        self.state.write().tab_mut(id)?.title = title.into();
        self.emit(StoreEvent::TabUpdated(id));
        Ok(())
    }

    /// Pins a tab to an environment, or clears the override with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown tab or environment.
    pub fn set_tab_environment(
        &self,
        id: TabId,
        environment_id: Option<EnvironmentId>,
    ) -> ApplicationResult<()> {
        {
            let mut state = self.state.write();
            if let Some(env_id) = environment_id {
                state.environment_mut(env_id)?;
            }
            state.tab_mut(id)?.environment_id = environment_id;
        }
        self.emit(StoreEvent::TabUpdated(id));
        Ok(())
    }

    // ---- environments ----

    /// Adds an environment.
    pub fn add_environment(&self, environment: Environment) -> EnvironmentId {
        let id = environment.id;
        self.state.write().environments.push(environment);
        debug!(environment = %id, "environment added");
        self.emit(StoreEvent::EnvironmentChanged(id));
        id
    }

    /// Replaces an environment with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown environment.
    pub fn update_environment(&self, environment: Environment) -> ApplicationResult<()> {
        let id = environment.id;
        *self.state.write().environment_mut(id)? = environment;
        self.emit(StoreEvent::EnvironmentChanged(id));
        Ok(())
    }

    /// Sets one variable of an environment.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown environment.
    pub fn set_environment_variable(
        &self,
        id: EnvironmentId,
        key: &str,
        value: impl Into<String>,
    ) -> ApplicationResult<()> {
        self.state.write().environment_mut(id)?.set(key, value);
        self.emit(StoreEvent::EnvironmentChanged(id));
        Ok(())
    }

    /// Removes an environment, clearing references to it.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown environment.
    pub fn remove_environment(&self, id: EnvironmentId) -> ApplicationResult<()> {
        let settings_changed = {
            let mut state = self.state.write();
            let index = state
                .environments
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| ApplicationError::not_found("environment", id))?;
            state.environments.remove(index);
            for tab in &mut state.tabs {
                if tab.environment_id == Some(id) {
                    tab.environment_id = None;
                }
            }
            let was_active = state.settings.active_environment_id == Some(id);
            if was_active {
                state.settings.active_environment_id = None;
            }
            was_active
        };
        self.emit(StoreEvent::EnvironmentChanged(id));
        if settings_changed {
            self.emit(StoreEvent::SettingsChanged);
        }
        Ok(())
    }

    /// Selects the globally active environment, or none.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown environment.
    pub fn set_active_environment(&self, id: Option<EnvironmentId>) -> ApplicationResult<()> {
        {
            let mut state = self.state.write();
            if let Some(env_id) = id {
                state.environment_mut(env_id)?;
            }
            state.settings.active_environment_id = id;
        }
        debug!(environment = ?id, "active environment changed");
        self.emit(StoreEvent::SettingsChanged);
        Ok(())
    }

    /// Returns a copy of an environment.
    #[must_use]
    pub fn environment(&self, id: EnvironmentId) -> Option<Environment> {
        self.state
            .read()
            .environments
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Returns copies of all environments.
    #[must_use]
    pub fn environments(&self) -> Vec<Environment> {
        self.state.read().environments.clone()
    }

    /// Returns the variable snapshot a send on this tab would start from.
    #[must_use]
    pub fn variables_for_tab(&self, id: TabId) -> VariableSnapshot {
        let state = self.state.read();
        state
            .tabs
            .iter()
            .find(|t| t.id == id)
            .and_then(|tab| state.environment_for(tab))
            .map(Environment::snapshot)
            .unwrap_or_default()
    }

    // ---- collections ----

    /// Creates an empty collection.
    pub fn create_collection(&self, name: impl Into<String>) -> CollectionId {
        let collection = Collection::new(name);
        let id = collection.id;
        self.state.write().collections.push(collection);
        self.emit(StoreEvent::CollectionChanged(id));
        id
    }

    /// Saves a tab's current request into a collection.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown tab or collection.
    pub fn save_tab_to_collection(
        &self,
        tab_id: TabId,
        collection_id: CollectionId,
        name: impl Into<String>,
    ) -> ApplicationResult<Uuid> {
        let saved = {
            let mut state = self.state.write();
            let request = state.tab_mut(tab_id)?.request.clone();
            state.collection_mut(collection_id)?.save(name, request)
        };
        self.emit(StoreEvent::CollectionChanged(collection_id));
        Ok(saved)
    }

    /// Opens a saved request in a new active tab.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown collection or request.
    pub fn open_saved_request(
        &self,
        collection_id: CollectionId,
        request_id: Uuid,
    ) -> ApplicationResult<TabId> {
        let id = {
            let mut state = self.state.write();
            let saved = state
                .collection_mut(collection_id)?
                .get(request_id)
                .cloned()
                .ok_or_else(|| ApplicationError::not_found("saved request", request_id))?;
            state.push_tab(Tab::titled(saved.name, saved.request))
        };
        self.emit(StoreEvent::TabAdded(id));
        self.emit(StoreEvent::TabActivated(id));
        Ok(id)
    }

    /// Removes a collection.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown collection.
    pub fn remove_collection(&self, id: CollectionId) -> ApplicationResult<()> {
        {
            let mut state = self.state.write();
            let before = state.collections.len();
            state.collections.retain(|c| c.id != id);
            if state.collections.len() == before {
                return Err(ApplicationError::not_found("collection", id));
            }
        }
        self.emit(StoreEvent::CollectionChanged(id));
        Ok(())
    }

    /// Returns copies of all collections.
    #[must_use]
    pub fn collections(&self) -> Vec<Collection> {
        self.state.read().collections.clone()
    }

    // ---- history ----

    /// Returns history entries, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().history.entries().iter().cloned().collect()
    }

    /// Reopens a history entry's request in a new active tab.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotFound`] for an unknown entry.
    pub fn open_history_entry(&self, entry_id: Uuid) -> ApplicationResult<TabId> {
        let request = self
            .state
            .read()
            .history
            .get(entry_id)
            .map(|e| e.request.clone())
            .ok_or_else(|| ApplicationError::not_found("history entry", entry_id))?;
        Ok(self.add_tab(request))
    }

    /// Removes all history entries.
    pub fn clear_history(&self) {
        self.state.write().history.clear();
        self.emit(StoreEvent::HistoryChanged);
    }

    // ---- cookies ----

    /// Returns a copy of the cookie jar.
    #[must_use]
    pub fn cookies(&self) -> CookieJar {
        self.state.read().cookies.clone()
    }

    /// Merges cookies observed for `host`.
    pub fn upsert_cookies(&self, cookies: impl IntoIterator<Item = Cookie>, host: &str) {
        self.state.write().cookies.upsert(cookies, host);
        self.emit(StoreEvent::CookiesChanged);
    }

    /// Empties the cookie jar.
    pub fn clear_cookies(&self) {
        self.state.write().cookies.clear();
        self.emit(StoreEvent::CookiesChanged);
    }

    // ---- settings ----

    /// Returns the current settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.state.read().settings.clone()
    }

    /// Sets the history cap, dropping the oldest entries beyond it.
    pub fn set_max_history_size(&self, max: usize) {
        {
            let mut state = self.state.write();
            state.settings.max_history_size = max;
            state.history.set_max_entries(max);
        }
        self.emit(StoreEvent::SettingsChanged);
        self.emit(StoreEvent::HistoryChanged);
    }

    /// Enables or disables recording sends into history.
    pub fn set_auto_save_history(&self, enabled: bool) {
        self.state.write().settings.auto_save_history = enabled;
        self.emit(StoreEvent::SettingsChanged);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use courier_domain::HttpMethod;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_store_has_one_active_tab() {
        let store = Store::new();
        let tabs = store.tabs();
        assert_eq!(tabs.len(), 1);
        assert_eq!(store.active_tab_id(), tabs[0].id);
    }

    #[test]
    fn test_add_tab_activates_it() {
        let store = Store::new();
        let id = store.add_tab(ApiRequest::get("https://api.example/users"));
        assert_eq!(store.active_tab_id(), id);
        assert_eq!(store.tab(id).unwrap().title, "GET api.example/users");
        assert_eq!(store.tabs().len(), 2);
    }

    #[test]
    fn test_close_last_tab_opens_a_fresh_one() {
        let store = Store::new();
        let only = store.active_tab_id();
        store.close_tab(only).unwrap();

        let tabs = store.tabs();
        assert_eq!(tabs.len(), 1);
        assert_ne!(tabs[0].id, only);
        assert_eq!(store.active_tab_id(), tabs[0].id);
    }

    #[test]
    fn test_close_active_tab_activates_neighbour() {
        let store = Store::new();
        let first = store.active_tab_id();
        let second = store.new_tab();
        let third = store.new_tab();
        store.set_active_tab(second).unwrap();

        store.close_tab(second).unwrap();
        assert_eq!(store.active_tab_id(), third);

        store.close_tab(third).unwrap();
        assert_eq!(store.active_tab_id(), first);
    }

    #[test]
    fn test_close_unknown_tab() {
        let store = Store::new();
        let err = store.close_tab(Uuid::nil()).unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[test]
    fn test_update_tab_request() {
        let store = Store::new();
        let id = store.active_tab_id();
        let request = ApiRequest::new(HttpMethod::Post, "https://api.example/items");
        store.update_tab_request(id, request.clone()).unwrap();
        assert_eq!(store.tab(id).unwrap().request, request);
    }

    #[test]
    fn test_tab_environment_override() {
        let store = Store::new();
        let dev = store.add_environment(Environment::new("dev").with_variable("host", "dev"));
        let prod = store.add_environment(Environment::new("prod").with_variable("host", "prod"));
        store.set_active_environment(Some(dev)).unwrap();

        let tab = store.active_tab_id();
        assert_eq!(store.variables_for_tab(tab)["host"], "dev");

        store.set_tab_environment(tab, Some(prod)).unwrap();
        assert_eq!(store.variables_for_tab(tab)["host"], "prod");

        store.remove_environment(prod).unwrap();
        assert_eq!(store.tab(tab).unwrap().environment_id, None);
        assert_eq!(store.variables_for_tab(tab)["host"], "dev");
    }

    #[test]
    fn test_active_environment_must_exist() {
        let store = Store::new();
        assert!(store.set_active_environment(Some(Uuid::nil())).is_err());
        assert_eq!(store.settings().active_environment_id, None);
    }

    #[test]
    fn test_collections_round_trip_through_tabs() {
        let store = Store::new();
        let tab = store.add_tab(ApiRequest::get("https://api.example/a"));
        let collection = store.create_collection("Demo");
        let saved = store.save_tab_to_collection(tab, collection, "List A").unwrap();

        let opened = store.open_saved_request(collection, saved).unwrap();
        let opened_tab = store.tab(opened).unwrap();
        assert_eq!(opened_tab.title, "List A");
        assert_eq!(opened_tab.request.url, "https://api.example/a");
        assert_eq!(store.active_tab_id(), opened);
    }

    #[test]
    fn test_history_cap_applies_on_change() {
        let store = Store::new();
        {
            let mut state = store.state.write();
            for i in 0..5 {
                let request = ApiRequest::get(format!("https://api.example/{i}"));
                state
                    .history
                    .add(HistoryEntry::new(request, 200, 1, chrono::Utc::now()));
            }
        }
        store.set_max_history_size(2);
        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].request.url, "https://api.example/4");
    }

    #[test]
    fn test_persisted_round_trip() {
        let store = Store::new();
        let env = store.add_environment(Environment::new("dev").with_variable("k", "v"));
        store.set_active_environment(Some(env)).unwrap();
        store.upsert_cookies([Cookie::new("sid", "1", "")], "api.example");

        let persisted = store.persisted();
        assert_eq!(persisted.version, PersistedState::CURRENT_VERSION);

        let restored = Store::from_persisted(persisted.clone());
        assert_eq!(restored.persisted(), persisted);
        assert_eq!(restored.tabs().len(), 1);
    }

    #[test]
    fn test_from_persisted_drops_dangling_active_environment() {
        let mut persisted = PersistedState::default();
        persisted.settings.active_environment_id = Some(Uuid::nil());
        let store = Store::from_persisted(persisted);
        assert_eq!(store.settings().active_environment_id, None);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let store = Store::new();
        let mut events = store.subscribe();

        let id = store.new_tab();
        store.clear_cookies();

        assert_eq!(events.recv().await.unwrap(), StoreEvent::TabAdded(id));
        assert_eq!(events.recv().await.unwrap(), StoreEvent::TabActivated(id));
        assert_eq!(events.recv().await.unwrap(), StoreEvent::CookiesChanged);
    }
}
