//! Control interface exposed by the UI layer
//!
//! Each supported control category has a trait with the control's native
//! get/set primitives. All categories share [`Widget`] for the identifier and
//! change notifications. [`ControlHandle`] is the closed set of categories the
//! binder understands; anything else is [`ControlHandle::Unsupported`].

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FormSyncError, Result};

/// Zero-argument change listener
pub type ChangeCallback = Rc<dyn Fn()>;

/// Handle returned by [`Widget::connect_changed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Value of a numeric control (spinner, slider, progress bar)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// Base trait of every control
pub trait Widget {
    /// Stable identifier of the control ("object name")
    fn object_name(&self) -> &str;

    /// Declared runtime type, only used in diagnostics
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Register a listener on the control's native change notification
    fn connect_changed(&self, callback: ChangeCallback) -> SubscriptionId;

    /// Remove a listener; false when `id` was not connected
    fn disconnect_changed(&self, id: SubscriptionId) -> bool;
}

/// Selector / combo box
pub trait SelectorWidget: Widget {
    fn current_text(&self) -> String;
    fn set_current_text(&self, text: &str);
}

/// Checkbox / toggle
pub trait ToggleWidget: Widget {
    fn is_checked(&self) -> bool;
    fn set_checked(&self, checked: bool);
}

/// Spinner, slider, progress bar
pub trait NumericWidget: Widget {
    fn value(&self) -> Number;
    fn set_value(&self, value: Number);
}

/// Multi-line text editor
pub trait PlainTextWidget: Widget {
    fn plain_text(&self) -> String;
    fn set_plain_text(&self, text: &str);
}

/// Single-line text input
pub trait LineEditWidget: Widget {
    fn text(&self) -> String;
    fn set_text(&self, text: &str);
}

/// Tab widget / stacked pages
pub trait PageWidget: Widget {
    fn current_index(&self) -> usize;
    fn set_current_index(&self, index: usize);
}

/// Date field
pub trait DateWidget: Widget {
    fn date(&self) -> NaiveDate;
    fn set_date(&self, date: NaiveDate);
}

/// Supported control categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Selector,
    Toggle,
    Numeric,
    MultiLineText,
    SingleLineText,
    PageIndex,
    Date,
}

impl ControlKind {
    pub const ALL: [ControlKind; 7] = [
        ControlKind::Selector,
        ControlKind::Toggle,
        ControlKind::Numeric,
        ControlKind::MultiLineText,
        ControlKind::SingleLineText,
        ControlKind::PageIndex,
        ControlKind::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Selector => "selector",
            ControlKind::Toggle => "toggle",
            ControlKind::Numeric => "numeric",
            ControlKind::MultiLineText => "multi_line_text",
            ControlKind::SingleLineText => "single_line_text",
            ControlKind::PageIndex => "page_index",
            ControlKind::Date => "date",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names plus common widget aliases
impl FromStr for ControlKind {
    type Err = FormSyncError;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "selector" | "combo" | "combo_box" => ControlKind::Selector,
            "toggle" | "checkbox" | "check_box" => ControlKind::Toggle,
            "numeric" | "spinner" | "spin_box" | "slider" | "progress" => ControlKind::Numeric,
            "multi_line_text" | "text_edit" | "textarea" => ControlKind::MultiLineText,
            "single_line_text" | "line_edit" | "text" => ControlKind::SingleLineText,
            "page_index" | "tabs" | "stack" => ControlKind::PageIndex,
            "date" | "date_edit" => ControlKind::Date,
            _ => {
                return Err(FormSyncError::invalid_config(format!(
                    "unknown control kind '{}'",
                    s
                )))
            }
        };
        Ok(kind)
    }
}

/// A live control, tagged with its category
#[derive(Clone)]
pub enum ControlHandle {
    Selector(Rc<dyn SelectorWidget>),
    Toggle(Rc<dyn ToggleWidget>),
    Numeric(Rc<dyn NumericWidget>),
    MultiLineText(Rc<dyn PlainTextWidget>),
    SingleLineText(Rc<dyn LineEditWidget>),
    PageIndex(Rc<dyn PageWidget>),
    Date(Rc<dyn DateWidget>),
    /// A control the capability table has no entry for
    Unsupported(Rc<dyn Widget>),
}

macro_rules! with_widget {
    ($handle:expr, $w:ident => $body:expr) => {
        match $handle {
            ControlHandle::Selector($w) => $body,
            ControlHandle::Toggle($w) => $body,
            ControlHandle::Numeric($w) => $body,
            ControlHandle::MultiLineText($w) => $body,
            ControlHandle::SingleLineText($w) => $body,
            ControlHandle::PageIndex($w) => $body,
            ControlHandle::Date($w) => $body,
            ControlHandle::Unsupported($w) => $body,
        }
    };
}

impl ControlHandle {
    /// Stable identifier of the underlying control
    pub fn identifier(&self) -> &str {
        with_widget!(self, w => w.object_name())
    }

    pub fn type_name(&self) -> &str {
        with_widget!(self, w => w.type_name())
    }

    /// Category, `None` for unsupported controls
    pub fn kind(&self) -> Option<ControlKind> {
        match self {
            ControlHandle::Selector(_) => Some(ControlKind::Selector),
            ControlHandle::Toggle(_) => Some(ControlKind::Toggle),
            ControlHandle::Numeric(_) => Some(ControlKind::Numeric),
            ControlHandle::MultiLineText(_) => Some(ControlKind::MultiLineText),
            ControlHandle::SingleLineText(_) => Some(ControlKind::SingleLineText),
            ControlHandle::PageIndex(_) => Some(ControlKind::PageIndex),
            ControlHandle::Date(_) => Some(ControlKind::Date),
            ControlHandle::Unsupported(_) => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.kind().is_some()
    }

    pub fn connect_changed(&self, callback: ChangeCallback) -> SubscriptionId {
        with_widget!(self, w => w.connect_changed(callback))
    }

    pub fn disconnect_changed(&self, id: SubscriptionId) -> bool {
        with_widget!(self, w => w.disconnect_changed(id))
    }
}

impl fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind().map_or("unsupported", |k| k.as_str());
        f.debug_struct("ControlHandle")
            .field("identifier", &self.identifier())
            .field("kind", &kind)
            .finish()
    }
}

/// Anything that owns controls, e.g. a window or form
pub trait ControlContainer {
    fn children(&self) -> Vec<ControlHandle>;
}

impl ControlContainer for [ControlHandle] {
    fn children(&self) -> Vec<ControlHandle> {
        self.to_vec()
    }
}

impl ControlContainer for Vec<ControlHandle> {
    fn children(&self) -> Vec<ControlHandle> {
        self.clone()
    }
}

/// All controls of `root` the capability table supports
pub fn list_controls<C: ControlContainer + ?Sized>(root: &C) -> Vec<ControlHandle> {
    root.children()
        .into_iter()
        .filter(ControlHandle::is_supported)
        .collect()
}

/// Find the control with the given identifier
pub fn find_control<'a>(controls: &'a [ControlHandle], identifier: &str) -> Option<&'a ControlHandle> {
    controls.iter().find(|c| c.identifier() == identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessControl;

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("spinner".parse::<ControlKind>().unwrap(), ControlKind::Numeric);
        assert_eq!("CheckBox".parse::<ControlKind>().unwrap(), ControlKind::Toggle);
        assert_eq!("line_edit".parse::<ControlKind>().unwrap(), ControlKind::SingleLineText);
        assert!("push_button".parse::<ControlKind>().is_err());
    }

    #[test]
    fn kind_round_trips_through_display() {
        for kind in ControlKind::ALL {
            assert_eq!(kind.to_string().parse::<ControlKind>().unwrap(), kind);
        }
    }

    #[test]
    fn handle_reports_identifier_and_kind() {
        let age = HeadlessControl::new("age", Number::Int(0));
        let handle = ControlHandle::Numeric(age);
        assert_eq!(handle.identifier(), "age");
        assert_eq!(handle.kind(), Some(ControlKind::Numeric));
    }

    #[test]
    fn list_controls_drops_unsupported() {
        let controls = vec![
            ControlHandle::Toggle(HeadlessControl::new("employed", false)),
            ControlHandle::Unsupported(HeadlessControl::unsupported("submit", "push_button")),
            ControlHandle::SingleLineText(HeadlessControl::new("name", String::new())),
        ];
        let found = list_controls(&controls);
        let names: Vec<_> = found.iter().map(ControlHandle::identifier).collect();
        assert_eq!(names, vec!["employed", "name"]);
    }

    #[test]
    fn find_control_by_identifier() {
        let controls = vec![ControlHandle::Toggle(HeadlessControl::new("employed", true))];
        assert!(find_control(&controls, "employed").is_some());
        assert!(find_control(&controls, "age").is_none());
    }
}
