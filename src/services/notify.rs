use crate::config::SettingsFormat;

/// Change notifications emitted by the theme store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeEvent {
    SettingFolderChanged(String),
    PrefixChanged(String),
    FormatChanged(SettingsFormat),
    ThemePathsChanged,
    CurrentThemeChanged(String),
    /// A theme was inserted or replaced in the collection
    ThemesChanged,
    /// The set of known theme names grew
    ThemeNamesChanged,
    /// The active theme now refers to different content
    ThemeChanged,
    ThemeLoadedChanged(bool),
}

pub type ListenerId = usize;

type Listener = Box<dyn FnMut(&ThemeEvent)>;

/// Synchronous observer list.
///
/// Listeners only see the event, never the store, so a handler cannot trigger
/// the mutation it is reacting to.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: ListenerId,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ThemeEvent) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: ThemeEvent) {
        tracing::trace!("emit {:?}", event);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
