//! In-memory controls
//!
//! [`HeadlessControl`] implements every control category without a UI
//! toolkit. Like native widgets it only notifies listeners when the value
//! actually changes. Used by tests and by the CLI to bind against a controls
//! manifest.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::NaiveDate;

use crate::capability::capability_for;
use crate::control::{
    ChangeCallback, ControlHandle, ControlKind, DateWidget, LineEditWidget, Number,
    NumericWidget, PageWidget, PlainTextWidget, SelectorWidget, SubscriptionId, ToggleWidget,
    Widget,
};
use crate::error::Result;
use crate::value::Scalar;

/// A control holding a value of type `T` in memory
pub struct HeadlessControl<T> {
    name: String,
    type_name: String,
    value: RefCell<T>,
    listeners: RefCell<Vec<(SubscriptionId, ChangeCallback)>>,
    next_id: Cell<u64>,
}

impl<T: Clone + PartialEq + 'static> HeadlessControl<T> {
    pub fn new(name: impl Into<String>, value: T) -> Rc<Self> {
        Self::labelled(name, value, std::any::type_name::<Self>())
    }

    fn labelled(name: impl Into<String>, value: T, type_name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            type_name: type_name.into(),
            value: RefCell::new(value),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        })
    }

    /// Current value
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value, notifying listeners if it changed
    pub fn set(&self, value: T) {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.emit();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn emit(&self) {
        // Listeners may read or write this control, so call them unborrowed
        let listeners: Vec<ChangeCallback> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl HeadlessControl<()> {
    /// A control of a category the capability table does not know
    pub fn unsupported(name: impl Into<String>, type_name: impl Into<String>) -> Rc<Self> {
        Self::labelled(name, (), type_name)
    }
}

impl<T> Widget for HeadlessControl<T> {
    fn object_name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn connect_changed(&self, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, callback));
        id
    }

    fn disconnect_changed(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }
}

impl SelectorWidget for HeadlessControl<String> {
    fn current_text(&self) -> String {
        self.get()
    }

    fn set_current_text(&self, text: &str) {
        self.set(text.to_string());
    }
}

impl PlainTextWidget for HeadlessControl<String> {
    fn plain_text(&self) -> String {
        self.get()
    }

    fn set_plain_text(&self, text: &str) {
        self.set(text.to_string());
    }
}

impl LineEditWidget for HeadlessControl<String> {
    fn text(&self) -> String {
        self.get()
    }

    fn set_text(&self, text: &str) {
        self.set(text.to_string());
    }
}

impl ToggleWidget for HeadlessControl<bool> {
    fn is_checked(&self) -> bool {
        self.get()
    }

    fn set_checked(&self, checked: bool) {
        self.set(checked);
    }
}

impl NumericWidget for HeadlessControl<Number> {
    fn value(&self) -> Number {
        self.get()
    }

    fn set_value(&self, value: Number) {
        self.set(value);
    }
}

impl PageWidget for HeadlessControl<usize> {
    fn current_index(&self) -> usize {
        self.get()
    }

    fn set_current_index(&self, index: usize) {
        self.set(index);
    }
}

impl DateWidget for HeadlessControl<NaiveDate> {
    fn date(&self) -> NaiveDate {
        self.get()
    }

    fn set_date(&self, date: NaiveDate) {
        self.set(date);
    }
}

/// Build a headless control of `kind` with its default value
pub fn control_of_kind(name: &str, kind: ControlKind) -> ControlHandle {
    match kind {
        ControlKind::Selector => ControlHandle::Selector(HeadlessControl::new(name, String::new())),
        ControlKind::Toggle => ControlHandle::Toggle(HeadlessControl::new(name, false)),
        ControlKind::Numeric => ControlHandle::Numeric(HeadlessControl::new(name, Number::Int(0))),
        ControlKind::MultiLineText => {
            ControlHandle::MultiLineText(HeadlessControl::new(name, String::new()))
        }
        ControlKind::SingleLineText => {
            ControlHandle::SingleLineText(HeadlessControl::new(name, String::new()))
        }
        ControlKind::PageIndex => ControlHandle::PageIndex(HeadlessControl::new(name, 0usize)),
        ControlKind::Date => ControlHandle::Date(HeadlessControl::new(name, NaiveDate::default())),
    }
}

/// Build a headless control from a manifest entry
///
/// Unknown kinds become [`ControlHandle::Unsupported`]; an initial value is
/// written through the control's capability.
pub fn control_from_spec(name: &str, kind: &str, value: Option<&Scalar>) -> Result<ControlHandle> {
    let handle = match kind.parse::<ControlKind>() {
        Ok(kind) => control_of_kind(name, kind),
        Err(_) => ControlHandle::Unsupported(HeadlessControl::unsupported(name, kind)),
    };

    if let (Some(value), true) = (value, handle.is_supported()) {
        capability_for(&handle)?.write(value)?;
    }
    Ok(handle)
}
