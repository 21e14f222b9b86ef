//! Registry of user-defined value types.
//!
//! Built-in values (integers, floats, strings, ...) carry their own tag in the
//! record encoding. Anything else is captured as a custom value: an opaque
//! byte payload plus a compact 16-bit type id handed out here. The registry
//! also maps type ids to render functions, so new value types can be rendered
//! without touching the formatter.
//!
//! # Thread Safety
//!
//! The registry is process-wide and guarded by a mutex; it can be used from
//! any thread.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

/// Turns a custom payload back into display text.
pub type RenderFn = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

struct TypeEntry {
    name: &'static str,
    renderer: Option<RenderFn>,
}

#[derive(Default)]
struct TypeTable {
    by_name: HashMap<&'static str, u16>,
    // Index `i` holds type id `i + 1`.
    entries: Vec<TypeEntry>,
}

lazy_static! {
    static ref TYPE_REGISTRY: Mutex<TypeTable> = Mutex::new(TypeTable::default());
}

/// Registers a custom value type and returns its id.
///
/// Registering the same name again returns the same id. Ids start at 1; 0 is
/// never handed out.
///
/// # Examples
///
/// ```
/// # use replay_logger::type_registry::{register_type, type_name};
/// let id = register_type("geometry::Point");
/// assert_eq!(register_type("geometry::Point"), id);
/// assert_eq!(type_name(id), Some("geometry::Point"));
/// ```
pub fn register_type(name: &'static str) -> u16 {
    let mut table = TYPE_REGISTRY.lock();
    if let Some(&id) = table.by_name.get(name) {
        return id;
    }

    table.entries.push(TypeEntry {
        name,
        renderer: None,
    });
    let id = table.entries.len() as u16;
    table.by_name.insert(name, id);
    id
}

/// Looks up the name a type id was registered under.
pub fn type_name(id: u16) -> Option<&'static str> {
    if id == 0 {
        return None;
    }
    let table = TYPE_REGISTRY.lock();
    table.entries.get(id as usize - 1).map(|entry| entry.name)
}

/// Installs the render function for a registered type.
///
/// Returns `false` if the id was never registered.
pub fn set_renderer<F>(id: u16, render: F) -> bool
where
    F: Fn(&[u8]) -> String + Send + Sync + 'static,
{
    if id == 0 {
        return false;
    }
    let mut table = TYPE_REGISTRY.lock();
    match table.entries.get_mut(id as usize - 1) {
        Some(entry) => {
            entry.renderer = Some(Arc::new(render));
            true
        }
        None => false,
    }
}

/// Renders a custom payload with its registered renderer.
///
/// Types without a renderer render as `<name: N bytes>`.
pub fn render_custom(id: u16, bytes: &[u8]) -> String {
    let (name, renderer) = {
        let table = TYPE_REGISTRY.lock();
        match id.checked_sub(1).and_then(|index| table.entries.get(index as usize)) {
            Some(entry) => (entry.name, entry.renderer.clone()),
            None => ("unregistered type", None),
        }
    };

    // The renderer runs outside the lock so it may register types itself.
    match renderer {
        Some(render) => render(bytes),
        None => format!("<{}: {} bytes>", name, bytes.len()),
    }
}
