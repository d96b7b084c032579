use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Top-level screens of the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    #[default]
    Dashboard,
    Organizer,
    History,
    Ai,
    Ml,
    Settings,
}

/// Presentation state shared by the dashboard views.
///
/// Owned by the UI store and changed only through `UiAction`s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub current_page: Page,
    #[serde(default)]
    pub pinned_symbol: Option<String>,
    /// Past the opening screen. Not persisted: every launch starts on it.
    #[serde(skip)]
    pub entered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum UiAction {
    ToggleTheme,
    SetTheme(Theme),
    Navigate(Page),
    /// Pin a symbol, or unpin it if it is already pinned
    TogglePin(String),
    ClearPin,
    Enter,
    Logout,
}

impl UiState {
    /// Apply one action, returning the next state
    pub fn reduce(mut self, action: UiAction) -> Self {
        match action {
            UiAction::ToggleTheme => self.theme = self.theme.toggled(),
            UiAction::SetTheme(theme) => self.theme = theme,
            UiAction::Navigate(page) => self.current_page = page,
            UiAction::TogglePin(symbol) => {
                self.pinned_symbol = if self.pinned_symbol.as_deref() == Some(symbol.as_str()) {
                    None
                } else {
                    Some(symbol)
                };
            }
            UiAction::ClearPin => self.pinned_symbol = None,
            UiAction::Enter => self.entered = true,
            UiAction::Logout => self.entered = false,
        }
        self
    }
}

/// Anything the signal list can rank
pub trait RankedSignal {
    fn symbol(&self) -> &str;
    fn score(&self) -> f64;
}

/// Pinned symbol first, the rest by score, highest first
pub fn order_signals<T: RankedSignal>(signals: &mut [T], pinned: Option<&str>) {
    signals.sort_by(|a, b| {
        let a_pinned = pinned == Some(a.symbol());
        let b_pinned = pinned == Some(b.symbol());
        match (a_pinned, b_pinned) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => b.score().total_cmp(&a.score()),
        }
    });
}
