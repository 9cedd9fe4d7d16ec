//! Capability table - control category to read/write/subscribe
//!
//! | Category         | Native value  | Scalar                   |
//! |------------------|---------------|--------------------------|
//! | selector         | current text  | Text                     |
//! | toggle           | checked       | Bool                     |
//! | numeric          | Number        | Int / Float              |
//! | multi_line_text  | plain text    | Text                     |
//! | single_line_text | text          | Text                     |
//! | page_index       | current index | Int (non-negative)       |
//! | date             | NaiveDate     | Text `dd.MM.yyyy`        |
//!
//! Writes never coerce: a scalar the control cannot natively hold is a
//! [`FormSyncError::ValueMismatch`].

use std::fmt;
use std::rc::Rc;

use chrono::NaiveDate;

use crate::control::{ChangeCallback, ControlHandle, ControlKind, Number, SubscriptionId};
use crate::error::{FormSyncError, Result};
use crate::value::Scalar;

/// Text form of dates stored in configuration trees (`03.01.2004`)
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Why a write closure refused a value
enum Rejection {
    Mismatch(&'static str),
    BadDate,
}

type ReadFn = Box<dyn Fn() -> Scalar>;
type WriteFn = Box<dyn Fn(&Scalar) -> std::result::Result<(), Rejection>>;

/// Read/write/subscribe access to one supported control
pub struct Capability {
    kind: ControlKind,
    handle: ControlHandle,
    read: ReadFn,
    write: WriteFn,
}

impl Capability {
    fn new<R, W>(handle: &ControlHandle, kind: ControlKind, read: R, write: W) -> Self
    where
        R: Fn() -> Scalar + 'static,
        W: Fn(&Scalar) -> std::result::Result<(), Rejection> + 'static,
    {
        Self {
            kind,
            handle: handle.clone(),
            read: Box::new(read),
            write: Box::new(write),
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        self.handle.identifier()
    }

    /// Current control value as a scalar
    pub fn read(&self) -> Scalar {
        (self.read)()
    }

    /// Set the control from a scalar
    pub fn write(&self, value: &Scalar) -> Result<()> {
        (self.write)(value).map_err(|rejection| match rejection {
            Rejection::Mismatch(found) => FormSyncError::ValueMismatch {
                identifier: self.identifier().to_string(),
                kind: self.kind,
                found,
            },
            Rejection::BadDate => FormSyncError::InvalidDate {
                value: value.to_string(),
            },
        })
    }

    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.handle.connect_changed(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handle.disconnect_changed(id)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("identifier", &self.identifier())
            .field("kind", &self.kind)
            .finish()
    }
}

fn text(value: &Scalar) -> std::result::Result<&str, Rejection> {
    value.as_str().ok_or(Rejection::Mismatch(value.type_name()))
}

/// Look up the capability of a control
pub fn capability_for(handle: &ControlHandle) -> Result<Capability> {
    let capability = match handle {
        ControlHandle::Selector(w) => {
            let (r, s) = (Rc::clone(w), Rc::clone(w));
            Capability::new(
                handle,
                ControlKind::Selector,
                move || Scalar::Text(r.current_text()),
                move |v| text(v).map(|t| s.set_current_text(t)),
            )
        }
        ControlHandle::Toggle(w) => {
            let (r, s) = (Rc::clone(w), Rc::clone(w));
            Capability::new(
                handle,
                ControlKind::Toggle,
                move || Scalar::Bool(r.is_checked()),
                move |v| match v {
                    Scalar::Bool(b) => {
                        s.set_checked(*b);
                        Ok(())
                    }
                    other => Err(Rejection::Mismatch(other.type_name())),
                },
            )
        }
        ControlHandle::Numeric(w) => {
            let (r, s) = (Rc::clone(w), Rc::clone(w));
            Capability::new(
                handle,
                ControlKind::Numeric,
                move || match r.value() {
                    Number::Int(i) => Scalar::Int(i),
                    Number::Float(f) => Scalar::Float(f),
                },
                move |v| {
                    let number = match v {
                        Scalar::Int(i) => Number::Int(*i),
                        Scalar::Float(f) => Number::Float(*f),
                        other => return Err(Rejection::Mismatch(other.type_name())),
                    };
                    s.set_value(number);
                    Ok(())
                },
            )
        }
        ControlHandle::MultiLineText(w) => {
            let (r, s) = (Rc::clone(w), Rc::clone(w));
            Capability::new(
                handle,
                ControlKind::MultiLineText,
                move || Scalar::Text(r.plain_text()),
                move |v| text(v).map(|t| s.set_plain_text(t)),
            )
        }
        ControlHandle::SingleLineText(w) => {
            let (r, s) = (Rc::clone(w), Rc::clone(w));
            Capability::new(
                handle,
                ControlKind::SingleLineText,
                move || Scalar::Text(r.text()),
                move |v| text(v).map(|t| s.set_text(t)),
            )
        }
        ControlHandle::PageIndex(w) => {
            let (r, s) = (Rc::clone(w), Rc::clone(w));
            Capability::new(
                handle,
                ControlKind::PageIndex,
                move || Scalar::Int(r.current_index() as i64),
                move |v| match v {
                    Scalar::Int(i) => {
                        let index =
                            usize::try_from(*i).map_err(|_| Rejection::Mismatch("negative integer"))?;
                        s.set_current_index(index);
                        Ok(())
                    }
                    other => Err(Rejection::Mismatch(other.type_name())),
                },
            )
        }
        ControlHandle::Date(w) => {
            let (r, s) = (Rc::clone(w), Rc::clone(w));
            Capability::new(
                handle,
                ControlKind::Date,
                move || Scalar::Text(r.date().format(DATE_FORMAT).to_string()),
                move |v| {
                    let date = NaiveDate::parse_from_str(text(v)?, DATE_FORMAT)
                        .map_err(|_| Rejection::BadDate)?;
                    s.set_date(date);
                    Ok(())
                },
            )
        }
        ControlHandle::Unsupported(w) => {
            return Err(FormSyncError::UnsupportedControl {
                identifier: w.object_name().to_string(),
                type_name: w.type_name().to_string(),
            })
        }
    };
    Ok(capability)
}
