//! Binder - keeps a configuration tree and a set of controls in sync
//!
//! A [`Binder`] owns one [`Hook`] per bound leaf key. Each hook pairs the
//! key with a control's capability:
//! ```text
//! push_to_controls:   ConfigTree leaf ──set──→ control
//! pull_from_controls: ConfigTree leaf ←──get── control
//! ```
//!
//! With `save_on_change` every control change pulls the tree. A "syncing"
//! flag is set for the duration of every push/pull, so the change
//! notifications a push causes never feed back into a pull.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::capability::{capability_for, Capability};
use crate::config::BindingConfig;
use crate::control::{find_control, ChangeCallback, ControlHandle, ControlKind, SubscriptionId};
use crate::error::{FormSyncError, Result};
use crate::persist;
use crate::registry::BindingRegistry;
use crate::resolver::{resolve_tree, KeyResolver, UnmatchedPolicy};
use crate::value::{ConfigTree, Node, Scalar};

/// Tree shared between the caller and a binder
pub type SharedTree = Rc<RefCell<ConfigTree>>;

/// Wrap a tree for sharing with a binder
pub fn shared(tree: ConfigTree) -> SharedTree {
    Rc::new(RefCell::new(tree))
}

// ═══════════════════════════════════════════════════════════════
// Hook
// ═══════════════════════════════════════════════════════════════

/// One configuration key bound to one control
pub struct Hook {
    key: String,
    capability: Capability,
}

impl Hook {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn identifier(&self) -> &str {
        self.capability.identifier()
    }

    pub fn kind(&self) -> ControlKind {
        self.capability.kind()
    }

    /// Current control value
    pub fn get(&self) -> Scalar {
        self.capability.read()
    }

    /// Set the control
    pub fn set(&self, value: &Scalar) -> Result<()> {
        self.capability.write(value)
    }

    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.capability.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.capability.unsubscribe(id)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("key", &self.key)
            .field("control", &self.identifier())
            .field("kind", &self.kind())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════

/// Configures and constructs a [`Binder`]
pub struct BinderBuilder {
    name: String,
    registry: BindingRegistry,
    data: Option<SharedTree>,
    source: Option<PathBuf>,
    resolver: Option<KeyResolver>,
    recursive: bool,
    allow_multiple_hooks: bool,
    on_unmatched: UnmatchedPolicy,
    save_on_change: bool,
    dump_on_save: bool,
}

impl BinderBuilder {
    pub fn new(name: impl Into<String>, registry: &BindingRegistry) -> Self {
        Self {
            name: name.into(),
            registry: registry.clone(),
            data: None,
            source: None,
            resolver: None,
            recursive: true,
            allow_multiple_hooks: false,
            on_unmatched: UnmatchedPolicy::default(),
            save_on_change: false,
            dump_on_save: false,
        }
    }

    /// Start from a binding file's settings
    pub fn from_config(config: &BindingConfig, registry: &BindingRegistry) -> Result<Self> {
        let mut builder = Self::new(config.name.clone(), registry)
            .source(&config.source)
            .recursive(config.recursive)
            .allow_multiple_hooks(config.allow_multiple_hooks)
            .on_unmatched(config.on_unmatched)
            .save_on_change(config.save_on_change)
            .dump_on_save(config.dump_on_save);
        if let Some(resolver) = config.key_resolver()? {
            builder = builder.resolver(resolver);
        }
        Ok(builder)
    }

    /// Bind a tree the caller keeps a handle to
    pub fn data(mut self, tree: SharedTree) -> Self {
        self.data = Some(tree);
        self
    }

    /// Data file; loaded at build time when no data is given
    pub fn source(mut self, path: impl AsRef<Path>) -> Self {
        self.source = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn resolver(mut self, resolver: KeyResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn allow_multiple_hooks(mut self, allow: bool) -> Self {
        self.allow_multiple_hooks = allow;
        self
    }

    /// What to do with keys without a control when no resolver is set
    pub fn on_unmatched(mut self, policy: UnmatchedPolicy) -> Self {
        self.on_unmatched = policy;
        self
    }

    pub fn save_on_change(mut self, enabled: bool) -> Self {
        self.save_on_change = enabled;
        self
    }

    pub fn dump_on_save(mut self, enabled: bool) -> Self {
        self.dump_on_save = enabled;
        self
    }

    /// Resolve keys, hook controls and claim them
    ///
    /// On failure every claim made so far is released.
    pub fn build(mut self, controls: &[ControlHandle]) -> Result<Binder> {
        let tree = match (self.data.take(), &self.source) {
            (Some(tree), _) => tree,
            (None, Some(source)) => shared(persist::load(source)?),
            (None, None) => {
                return Err(FormSyncError::invalid_config(
                    "either data or a source path must be provided",
                ))
            }
        };

        self.registry.register(&self.name)?;
        let hooks = match self.hook_controls(&tree, controls) {
            Ok(hooks) => hooks,
            Err(e) => {
                self.registry.release(&self.name);
                return Err(e);
            }
        };

        let index = hooks
            .iter()
            .enumerate()
            .map(|(i, hook)| (hook.key.clone(), i))
            .collect();

        info!(binder = %self.name, hooks = hooks.len(), "binder built");

        let binder = Binder {
            state: Rc::new(BinderState {
                name: self.name,
                tree,
                source: self.source,
                recursive: self.recursive,
                hooks,
                index,
                registry: self.registry,
                syncing: Cell::new(false),
                save_on_change: Cell::new(false),
                dump_on_save: Cell::new(false),
                auto_save: RefCell::new(Vec::new()),
                callbacks: RefCell::new(Vec::new()),
            }),
        };

        // Dropping the binder on error releases its claims
        binder.set_dump_on_save(self.dump_on_save)?;
        binder.set_save_on_change(self.save_on_change);
        Ok(binder)
    }

    fn hook_controls(
        &mut self,
        tree: &SharedTree,
        controls: &[ControlHandle],
    ) -> Result<Vec<Hook>> {
        let identifiers: Vec<&str> = controls.iter().map(ControlHandle::identifier).collect();
        let resolution = resolve_tree(
            &tree.borrow(),
            &identifiers,
            self.resolver.as_mut(),
            self.recursive,
            self.on_unmatched,
        )?;

        let mut hooks = Vec::with_capacity(resolution.len());
        for (key, identifier) in resolution.iter() {
            if !self.allow_multiple_hooks {
                self.registry.check_unclaimed(&self.name, identifier)?;
            }
            let control = find_control(controls, identifier).ok_or_else(|| {
                FormSyncError::ControlNotFound {
                    key: key.to_string(),
                }
            })?;
            let capability = capability_for(control)?;
            self.registry.claim(&self.name, identifier);
            debug!(
                binder = %self.name,
                key,
                control = identifier,
                kind = %capability.kind(),
                "hook created"
            );
            hooks.push(Hook {
                key: key.to_string(),
                capability,
            });
        }
        Ok(hooks)
    }
}

// ═══════════════════════════════════════════════════════════════
// Binder
// ═══════════════════════════════════════════════════════════════

/// A user callback connected to one hook
struct UserSubscription {
    hook: usize,
    callback: ChangeCallback,
    id: SubscriptionId,
}

struct BinderState {
    name: String,
    tree: SharedTree,
    source: Option<PathBuf>,
    recursive: bool,
    hooks: Vec<Hook>,
    index: FxHashMap<String, usize>,
    registry: BindingRegistry,
    syncing: Cell<bool>,
    save_on_change: Cell<bool>,
    dump_on_save: Cell<bool>,
    auto_save: RefCell<Vec<(usize, SubscriptionId)>>,
    callbacks: RefCell<Vec<UserSubscription>>,
}

/// Sets the syncing flag until dropped, then restores the previous state
struct SyncGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> SyncGuard<'a> {
    fn engage(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

impl BinderState {
    fn hook(&self, key: &str) -> Option<&Hook> {
        self.index.get(key).map(|&i| &self.hooks[i])
    }

    fn write_controls(&self, tree: &ConfigTree) -> Result<()> {
        for (key, node) in tree.iter() {
            match node {
                Node::Tree(subtree) => {
                    if self.recursive {
                        self.write_controls(subtree)?;
                    }
                }
                Node::Scalar(value) => {
                    if let Some(hook) = self.hook(key) {
                        hook.set(value)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_controls(&self, tree: &mut ConfigTree) {
        for (key, node) in tree.iter_mut() {
            match node {
                Node::Tree(subtree) => {
                    if self.recursive {
                        self.read_controls(subtree);
                    }
                }
                Node::Scalar(value) => {
                    if let Some(hook) = self.hook(key) {
                        *value = hook.get();
                    }
                }
            }
        }
    }

    fn controls_match(&self, tree: &ConfigTree) -> bool {
        tree.iter().all(|(key, node)| match node {
            Node::Tree(subtree) => !self.recursive || self.controls_match(subtree),
            Node::Scalar(value) => self.hook(key).map_or(true, |hook| hook.get() == *value),
        })
    }

    fn pull(&self) -> Result<()> {
        let _guard = SyncGuard::engage(&self.syncing);
        {
            let mut tree = self
                .tree
                .try_borrow_mut()
                .map_err(|_| FormSyncError::TreeBusy {
                    binder: self.name.clone(),
                })?;
            self.read_controls(&mut tree);
        }
        if self.dump_on_save.get() {
            self.save()?;
        }
        Ok(())
    }

    fn source(&self, action: &str) -> Result<&Path> {
        self.source.as_deref().ok_or_else(|| {
            FormSyncError::invalid_config(format!(
                "binder '{}' can't {} without a source path",
                self.name, action
            ))
        })
    }

    fn save(&self) -> Result<()> {
        let path = self.source("save")?;
        let tree = self.tree.try_borrow().map_err(|_| FormSyncError::TreeBusy {
            binder: self.name.clone(),
        })?;
        persist::save(path, &tree)
    }

    /// Hooks whose key is not in `exclude`, with their index
    fn visible_hooks<'a>(
        &'a self,
        exclude: &'a [&'a str],
    ) -> impl Iterator<Item = (usize, &'a Hook)> + 'a {
        self.hooks
            .iter()
            .enumerate()
            .filter(move |(_, hook)| !exclude.iter().any(|key| *key == hook.key()))
    }
}

impl Drop for BinderState {
    fn drop(&mut self) {
        for (hook, id) in self.auto_save.get_mut().drain(..) {
            self.hooks[hook].unsubscribe(id);
        }
        for sub in self.callbacks.get_mut().drain(..) {
            self.hooks[sub.hook].unsubscribe(sub.id);
        }
        self.registry.release(&self.name);
        debug!(binder = %self.name, "binder dropped");
    }
}

/// Bidirectional link between a configuration tree and its controls
///
/// Dropping the binder disconnects its callbacks and frees its controls for
/// other binders.
pub struct Binder {
    state: Rc<BinderState>,
}

impl Binder {
    pub fn builder(name: impl Into<String>, registry: &BindingRegistry) -> BinderBuilder {
        BinderBuilder::new(name, registry)
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Handle to the bound tree
    pub fn tree(&self) -> SharedTree {
        Rc::clone(&self.state.tree)
    }

    pub fn source(&self) -> Option<&Path> {
        self.state.source.as_deref()
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.state.hooks
    }

    // ─────────────────────────────────────────────────────────────
    // Synchronisation
    // ─────────────────────────────────────────────────────────────

    /// Write every bound leaf of the tree into its control
    ///
    /// Does nothing while this binder is already syncing. Leaves are written
    /// in tree order and the walk stops at the first value a control rejects:
    /// controls before it keep the new value, controls after it are untouched.
    pub fn push_to_controls(&self) -> Result<()> {
        if self.state.syncing.get() {
            debug!(binder = %self.state.name, "push skipped, already syncing");
            return Ok(());
        }
        // Controls may read the shared tree from their change callbacks
        let snapshot = self
            .state
            .tree
            .try_borrow()
            .map_err(|_| FormSyncError::TreeBusy {
                binder: self.state.name.clone(),
            })?
            .clone();
        self.push_tree(&snapshot)
    }

    /// Write the bound leaves of `tree` (e.g. a subtree) into their controls
    ///
    /// Stops at the first rejected value, like [`Binder::push_to_controls`].
    pub fn push_tree(&self, tree: &ConfigTree) -> Result<()> {
        let _guard = SyncGuard::engage(&self.state.syncing);
        self.state.write_controls(tree)
    }

    /// Overwrite every bound leaf of the tree with its control's value
    ///
    /// Saves to the source file afterwards when `dump_on_save` is on.
    pub fn pull_from_controls(&self) -> Result<()> {
        self.state.pull()
    }

    /// Overwrite the bound leaves of `tree` with their controls' values
    pub fn pull_into(&self, tree: &mut ConfigTree) {
        let _guard = SyncGuard::engage(&self.state.syncing);
        self.state.read_controls(tree);
    }

    /// True when every bound control holds the value stored in the tree
    pub fn values_match(&self) -> bool {
        match self.state.tree.try_borrow() {
            Ok(tree) => self.state.controls_match(&tree),
            Err(_) => false,
        }
    }

    /// Read one control by configuration key or by control identifier
    pub fn control_value(&self, name: &str) -> Result<Scalar> {
        self.state
            .hook(name)
            .or_else(|| self.state.hooks.iter().find(|h| h.identifier() == name))
            .map(Hook::get)
            .ok_or_else(|| FormSyncError::HookNotFound {
                key: name.to_string(),
            })
    }

    // ─────────────────────────────────────────────────────────────
    // Callbacks
    // ─────────────────────────────────────────────────────────────

    /// Connect `callback` to every hook except the `exclude`d keys
    pub fn connect_callback(&self, callback: &ChangeCallback, exclude: &[&str]) {
        let mut callbacks = self.state.callbacks.borrow_mut();
        for (i, hook) in self.state.visible_hooks(exclude) {
            let id = hook.subscribe(Rc::clone(callback));
            callbacks.push(UserSubscription {
                hook: i,
                callback: Rc::clone(callback),
                id,
            });
        }
    }

    /// Disconnect `callback` (or every user callback when `None`) from
    /// every hook except the `exclude`d keys
    ///
    /// Hooks the callback was never connected to are logged, not reported.
    pub fn disconnect_callback(&self, callback: Option<&ChangeCallback>, exclude: &[&str]) {
        let mut callbacks = self.state.callbacks.borrow_mut();
        for (i, hook) in self.state.visible_hooks(exclude) {
            let before = callbacks.len();
            callbacks.retain(|sub| {
                let matches = sub.hook == i
                    && callback.map_or(true, |cb| same_callback(cb, &sub.callback));
                if matches {
                    hook.unsubscribe(sub.id);
                }
                !matches
            });
            if callback.is_some() && callbacks.len() == before {
                warn!(
                    binder = %self.state.name,
                    key = hook.key(),
                    "tried disconnecting a callback that is not connected"
                );
            }
        }
    }

    pub fn save_on_change(&self) -> bool {
        self.state.save_on_change.get()
    }

    /// Pull the tree whenever a bound control changes outside a push
    pub fn set_save_on_change(&self, enabled: bool) {
        if self.state.save_on_change.replace(enabled) == enabled {
            return;
        }
        let mut auto_save = self.state.auto_save.borrow_mut();
        if !enabled {
            for (hook, id) in auto_save.drain(..) {
                self.state.hooks[hook].unsubscribe(id);
            }
            return;
        }

        let handler = auto_save_handler(Rc::downgrade(&self.state));
        for (i, hook) in self.state.hooks.iter().enumerate() {
            auto_save.push((i, hook.subscribe(Rc::clone(&handler))));
        }
    }

    pub fn dump_on_save(&self) -> bool {
        self.state.dump_on_save.get()
    }

    /// Save to the source file after every pull of the whole tree
    pub fn set_dump_on_save(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.state.source("dump on save")?;
        }
        self.state.dump_on_save.set(enabled);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Source file
    // ─────────────────────────────────────────────────────────────

    /// Replace the tree's contents with the source file's
    pub fn reload(&self) -> Result<()> {
        let fresh = persist::load(self.state.source("reload")?)?;
        let mut tree = self
            .state
            .tree
            .try_borrow_mut()
            .map_err(|_| FormSyncError::TreeBusy {
                binder: self.state.name.clone(),
            })?;
        *tree = fresh;
        Ok(())
    }

    /// Write the tree to the source file
    pub fn save(&self) -> Result<()> {
        self.state.save()
    }
}

fn same_callback(a: &ChangeCallback, b: &ChangeCallback) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

fn auto_save_handler(state: Weak<BinderState>) -> ChangeCallback {
    Rc::new(move || {
        let Some(state) = state.upgrade() else {
            return;
        };
        if state.syncing.get() {
            return;
        }
        if let Err(e) = state.pull() {
            warn!(binder = %state.name, error = %e, "auto-save failed");
        }
    })
}

impl fmt::Display for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = match self.state.tree.try_borrow() {
            Ok(tree) => tree.keys().collect::<Vec<_>>().join(", "),
            Err(_) => String::from("..."),
        };
        write!(f, "Binder '{}', responsible for [{}]", self.state.name, keys)
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("name", &self.state.name)
            .field("source", &self.state.source)
            .field("hooks", &self.state.hooks)
            .finish()
    }
}
