//! Window visibility, collapse and placement.
//!
//! [`WindowLifecycleController`] is the only component that shows or hides the
//! window. It talks to the shell through a [`WindowHandle`] and publishes the
//! derived [`WindowState`] on a `watch` channel. Without a handle every
//! operation that needs the window is a no-op.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::prefs::store::{Point, Preferences};

/// Stacking level requested from the shell.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WindowLevel {
    /// Regular stacking.
    Normal,
    /// Above regular windows.
    Floating,
}

impl WindowLevel {
    /// Level for the always-on-top flag.
    #[must_use]
    pub const fn from_always_on_top(always_on_top: bool) -> Self {
        if always_on_top {
            Self::Floating
        } else {
            Self::Normal
        }
    }
}

/// Shell-side window operations.
pub trait WindowHandle: Send {
    /// Current frame origin.
    fn origin(&self) -> Point;
    /// Move the window.
    fn set_origin(&mut self, origin: Point);
    /// Let the shell pick its default placement.
    fn place_default(&mut self);
    /// Bring the window to the front and activate the app.
    fn order_front(&mut self);
    /// Remove the window from screen.
    fn order_out(&mut self);
    /// Change the stacking level.
    fn set_level(&mut self, level: WindowLevel);
    /// Resize for the collapsed or expanded layout.
    fn resize_for_collapse(&mut self, collapsed: bool);
    /// Change the window alpha.
    fn set_opacity(&mut self, opacity: f64);
}

/// Observable window state. Only `visible` is not persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowState {
    /// On screen.
    pub visible: bool,
    /// Chat pane hidden.
    pub collapsed: bool,
    /// Last known origin.
    pub origin: Point,
    /// Window alpha.
    pub opacity: f64,
    /// Floating level.
    pub always_on_top: bool,
}

/// Single authority for window lifecycle.
pub struct WindowLifecycleController {
    prefs: Preferences,
    handle: Option<Box<dyn WindowHandle>>,
    state: watch::Sender<WindowState>,
}

impl WindowLifecycleController {
    /// Controller seeded from persisted preferences. Always starts hidden.
    #[must_use]
    pub fn new(prefs: Preferences) -> Self {
        let initial = WindowState {
            visible: false,
            collapsed: prefs.is_collapsed(),
            origin: prefs.window_origin().unwrap_or_default(),
            opacity: prefs.opacity(),
            always_on_top: prefs.always_on_top(),
        };
        let (state, _) = watch::channel(initial);
        Self {
            prefs,
            handle: None,
            state,
        }
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WindowState> {
        self.state.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WindowState {
        *self.state.borrow()
    }

    /// Whether the window is on screen.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    /// Whether a shell window is attached.
    #[must_use]
    pub const fn has_window(&self) -> bool {
        self.handle.is_some()
    }

    /// Attach the shell window and apply the persisted presentation.
    pub fn attach(&mut self, mut handle: Box<dyn WindowHandle>) {
        let state = self.state();
        handle.set_level(WindowLevel::from_always_on_top(state.always_on_top));
        handle.set_opacity(state.opacity);
        handle.resize_for_collapse(state.collapsed);
        match self.prefs.window_origin() {
            Some(origin) => handle.set_origin(origin),
            None => handle.place_default(),
        }
        let origin = handle.origin();
        self.handle = Some(handle);
        self.state.send_modify(|s| s.origin = origin);
        debug!("Window attached at ({}, {})", origin.x, origin.y);
    }

    /// Drop the shell window. The controller keeps working as a no-op.
    pub fn detach(&mut self) -> Option<Box<dyn WindowHandle>> {
        self.state.send_modify(|s| s.visible = false);
        self.handle.take()
    }

    /// Hidden to Visible. Returns whether anything changed.
    pub fn show(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        if self.state.borrow().visible {
            return false;
        }
        handle.order_front();
        self.state.send_modify(|s| s.visible = true);
        info!("Window shown");
        true
    }

    /// Visible to Hidden, saving the origin. Returns whether anything changed.
    pub fn hide(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        if !self.state.borrow().visible {
            return false;
        }
        let origin = handle.origin();
        self.prefs.set_window_origin(origin);
        handle.order_out();
        self.state.send_modify(|s| {
            s.visible = false;
            s.origin = origin;
        });
        info!("Window hidden");
        true
    }

    /// Flip visibility.
    pub fn toggle(&mut self) -> bool {
        if self.is_visible() { self.hide() } else { self.show() }
    }

    /// The shell minimised the window. The origin is not saved.
    pub fn miniaturized(&mut self) {
        if self.is_visible() {
            self.state.send_modify(|s| s.visible = false);
            info!("Window miniaturized");
        }
    }

    /// The shell is about to close the window.
    pub fn will_close(&mut self) {
        self.hide();
    }

    /// Persist the collapse flag and resize.
    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.prefs.set_collapsed(collapsed);
        if let Some(handle) = self.handle.as_mut() {
            handle.resize_for_collapse(collapsed);
        }
        self.state.send_modify(|s| s.collapsed = collapsed);
        debug!("Window collapsed = {collapsed}");
    }

    /// Persist the floating flag and change level.
    pub fn update_always_on_top(&mut self, always_on_top: bool) {
        self.prefs.set_always_on_top(always_on_top);
        if let Some(handle) = self.handle.as_mut() {
            handle.set_level(WindowLevel::from_always_on_top(always_on_top));
        }
        self.state.send_modify(|s| s.always_on_top = always_on_top);
        debug!("Window always on top = {always_on_top}");
    }

    /// Clamp, persist and apply an opacity. Returns the applied value.
    pub fn set_opacity(&mut self, opacity: f64) -> f64 {
        let applied = self.prefs.set_opacity(opacity);
        if let Some(handle) = self.handle.as_mut() {
            handle.set_opacity(applied);
        }
        self.state.send_modify(|s| s.opacity = applied);
        applied
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::config::WindowConfig;
    use crate::prefs::store::{InMemoryPreferences, PrefKey, PrefValue, PreferencesStore};

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        SetOrigin(Point),
        PlaceDefault,
        OrderFront,
        OrderOut,
        Level(WindowLevel),
        Collapse(bool),
        Opacity(f64),
    }

    #[derive(Clone, Default)]
    struct FakeWindow {
        origin: Arc<Mutex<Point>>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl FakeWindow {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn drag_to(&self, origin: Point) {
            *self.origin.lock().unwrap() = origin;
        }
    }

    impl WindowHandle for FakeWindow {
        fn origin(&self) -> Point {
            *self.origin.lock().unwrap()
        }
        fn set_origin(&mut self, origin: Point) {
            self.drag_to(origin);
            self.record(Call::SetOrigin(origin));
        }
        fn place_default(&mut self) {
            self.drag_to(Point::new(900.0, 60.0));
            self.record(Call::PlaceDefault);
        }
        fn order_front(&mut self) {
            self.record(Call::OrderFront);
        }
        fn order_out(&mut self) {
            self.record(Call::OrderOut);
        }
        fn set_level(&mut self, level: WindowLevel) {
            self.record(Call::Level(level));
        }
        fn resize_for_collapse(&mut self, collapsed: bool) {
            self.record(Call::Collapse(collapsed));
        }
        fn set_opacity(&mut self, opacity: f64) {
            self.record(Call::Opacity(opacity));
        }
    }

    fn setup() -> (WindowLifecycleController, FakeWindow, Arc<InMemoryPreferences>) {
        let store = Arc::new(InMemoryPreferences::new());
        let prefs = Preferences::new(store.clone(), WindowConfig::default());
        let mut controller = WindowLifecycleController::new(prefs);
        let window = FakeWindow::default();
        controller.attach(Box::new(window.clone()));
        (controller, window, store)
    }

    #[test]
    fn test_starts_hidden_even_when_prefs_exist() {
        let store = Arc::new(InMemoryPreferences::new());
        store.set(PrefKey::WindowIsCollapsed, PrefValue::Bool(true)).unwrap();
        let controller =
            WindowLifecycleController::new(Preferences::new(store, WindowConfig::default()));
        let state = controller.state();
        assert!(!state.visible);
        assert!(state.collapsed);
    }

    #[test]
    fn test_without_handle_everything_is_noop() {
        let prefs = Preferences::new(Arc::new(InMemoryPreferences::new()), WindowConfig::default());
        let mut controller = WindowLifecycleController::new(prefs);
        assert!(!controller.show());
        assert!(!controller.toggle());
        assert!(!controller.is_visible());
        controller.set_collapsed(true);
        assert!(controller.state().collapsed);
    }

    #[test]
    fn test_attach_places_default_without_saved_origin() {
        let (controller, window, _) = setup();
        let calls = window.calls();
        assert_eq!(calls[0], Call::Level(WindowLevel::Normal));
        assert_eq!(calls[1], Call::Opacity(0.95));
        assert_eq!(calls[2], Call::Collapse(false));
        assert_eq!(calls[3], Call::PlaceDefault);
        assert_eq!(controller.state().origin, Point::new(900.0, 60.0));
    }

    #[test]
    fn test_attach_restores_saved_presentation() {
        let store = Arc::new(InMemoryPreferences::new());
        store.set(PrefKey::AlwaysOnTop, PrefValue::Bool(true)).unwrap();
        store.set(PrefKey::WindowOriginX, PrefValue::Float(40.0)).unwrap();
        store.set(PrefKey::WindowOriginY, PrefValue::Float(80.0)).unwrap();
        let mut controller =
            WindowLifecycleController::new(Preferences::new(store, WindowConfig::default()));
        let window = FakeWindow::default();
        controller.attach(Box::new(window.clone()));

        let calls = window.calls();
        assert!(calls.contains(&Call::Level(WindowLevel::Floating)));
        assert!(calls.contains(&Call::SetOrigin(Point::new(40.0, 80.0))));
        assert!(!calls.contains(&Call::PlaceDefault));
    }

    #[test]
    fn test_toggle_twice_restores_visibility() {
        let (mut controller, window, _) = setup();
        assert!(controller.toggle());
        assert!(controller.is_visible());
        assert!(controller.toggle());
        assert!(!controller.is_visible());

        let moves: Vec<_> = window
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::OrderFront | Call::OrderOut))
            .collect();
        assert_eq!(moves, vec![Call::OrderFront, Call::OrderOut]);
    }

    #[test]
    fn test_show_is_idempotent() {
        let (mut controller, window, _) = setup();
        assert!(controller.show());
        assert!(!controller.show());
        let fronts = window.calls().iter().filter(|c| **c == Call::OrderFront).count();
        assert_eq!(fronts, 1);
    }

    #[test]
    fn test_hide_saves_origin_once() {
        let (mut controller, window, store) = setup();
        controller.show();
        window.drag_to(Point::new(300.0, 200.0));
        assert!(controller.hide());
        assert_eq!(store.get(PrefKey::WindowOriginX).unwrap(), Some(PrefValue::Float(300.0)));

        // a second hide must not overwrite the saved origin
        window.drag_to(Point::new(1.0, 1.0));
        assert!(!controller.hide());
        assert_eq!(store.get(PrefKey::WindowOriginX).unwrap(), Some(PrefValue::Float(300.0)));
        assert_eq!(store.get(PrefKey::WindowOriginY).unwrap(), Some(PrefValue::Float(200.0)));
    }

    #[test]
    fn test_miniaturize_hides_without_saving() {
        let (mut controller, window, store) = setup();
        controller.show();
        window.drag_to(Point::new(5.0, 5.0));
        controller.miniaturized();
        assert!(!controller.is_visible());
        assert_eq!(store.get(PrefKey::WindowOriginX).unwrap(), None);
        assert!(!window.calls().contains(&Call::OrderOut));
    }

    #[test]
    fn test_will_close_routes_through_hide() {
        let (mut controller, window, store) = setup();
        controller.show();
        window.drag_to(Point::new(7.0, 8.0));
        controller.will_close();
        assert!(!controller.is_visible());
        assert_eq!(store.get(PrefKey::WindowOriginY).unwrap(), Some(PrefValue::Float(8.0)));
    }

    #[test]
    fn test_collapse_level_and_opacity_persist_and_signal() {
        let (mut controller, window, store) = setup();
        let mut updates = controller.subscribe();

        controller.set_collapsed(true);
        controller.update_always_on_top(true);
        let applied = controller.set_opacity(0.2);

        assert!((applied - 0.5).abs() < f64::EPSILON);
        assert_eq!(store.get(PrefKey::WindowIsCollapsed).unwrap(), Some(PrefValue::Bool(true)));
        assert_eq!(store.get(PrefKey::AlwaysOnTop).unwrap(), Some(PrefValue::Bool(true)));
        assert_eq!(store.get(PrefKey::WindowOpacity).unwrap(), Some(PrefValue::Float(0.5)));

        let calls = window.calls();
        assert!(calls.contains(&Call::Collapse(true)));
        assert!(calls.contains(&Call::Level(WindowLevel::Floating)));
        assert!(calls.contains(&Call::Opacity(0.5)));

        assert!(updates.has_changed().unwrap());
        let state = *updates.borrow_and_update();
        assert!(state.collapsed && state.always_on_top);
        assert!((state.opacity - 0.5).abs() < f64::EPSILON);
    }
}
