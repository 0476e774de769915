//! Synthetic input built on the stroke protocol: moves, clicks, key presses,
//! typing and scrolling.
//!
//! Every action resolves its key or button name before any stroke is sent, so
//! an unknown name never leaves a half-finished action behind. Each down and
//! up stroke is followed by a settle delay; callers can lengthen or shorten a
//! delay per call, but a zero override falls back to the configured value.

use crate::config::InputConfig;
use crate::context::{shared_context, Context};
use crate::device::{self, Device};
use crate::driver::{Driver, NativeDriver};
use crate::error::{InterceptionError, Result};
use crate::keys::{self, Key, MouseButton};
use crate::screen::{self, ScreenMetrics, SystemScreen};
use crate::stroke::{MouseStroke, Stroke, WHEEL_DELTA};
use log::{debug, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default gap between repeated presses or clicks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);
/// Default gap between typed characters.
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_millis(50);
/// Default pause between moving and clicking in [`InputActions::click_at`].
pub const DEFAULT_CLICK_DELAY: Duration = Duration::from_millis(300);

/// Where actions spend their delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    fn rolling(self) -> i16 {
        match self {
            Self::Up => WHEEL_DELTA,
            Self::Down => -WHEEL_DELTA,
        }
    }
}

fn settle(delay: Option<Duration>, default: Duration) -> Duration {
    match delay {
        Some(delay) if !delay.is_zero() => delay,
        _ => default,
    }
}

/// Input actions against one keyboard slot and one mouse slot.
pub struct InputActions<D: Driver = NativeDriver> {
    context: Arc<Context<D>>,
    config: InputConfig,
    screen: Arc<dyn ScreenMetrics>,
    sleeper: Arc<dyn Sleeper>,
}

impl<D: Driver> Clone for InputActions<D> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            config: self.config.clone(),
            screen: Arc::clone(&self.screen),
            sleeper: Arc::clone(&self.sleeper),
        }
    }
}

impl InputActions<NativeDriver> {
    /// Actions on the process-wide driver context.
    ///
    /// Fails with `DriverNotFound` when the driver is not available.
    pub fn new(config: InputConfig) -> Result<Self> {
        Self::with_context(shared_context()?, config)
    }
}

impl<D: Driver> InputActions<D> {
    pub fn with_context(context: Arc<Context<D>>, config: InputConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            context,
            config,
            screen: Arc::new(SystemScreen),
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    pub fn with_screen(mut self, screen: impl ScreenMetrics + 'static) -> Self {
        self.screen = Arc::new(screen);
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Context<D>> {
        &self.context
    }

    /// A copy of these actions that types on another keyboard slot.
    pub fn with_keyboard(&self, keyboard: Device) -> Result<Self> {
        if !device::is_keyboard(keyboard) {
            return Err(InterceptionError::InvalidDevice(keyboard));
        }
        let mut actions = self.clone();
        actions.config.keyboard = keyboard;
        Ok(actions)
    }

    /// A copy of these actions that drives another mouse slot.
    pub fn with_mouse(&self, mouse: Device) -> Result<Self> {
        if !device::is_mouse(mouse) {
            return Err(InterceptionError::InvalidDevice(mouse));
        }
        let mut actions = self.clone();
        actions.config.mouse = mouse;
        Ok(actions)
    }

    fn send_mouse(&self, stroke: MouseStroke) -> Result<()> {
        self.context.send(self.config.mouse, &Stroke::Mouse(stroke))
    }

    fn send_key(&self, key: Key, down: bool, delay: Option<Duration>) -> Result<()> {
        let stroke = if down { key.down() } else { key.up() };
        self.context
            .send(self.config.keyboard, &Stroke::Key(stroke))?;
        self.sleeper
            .sleep(settle(delay, self.config.key_press_delay()));
        Ok(())
    }

    fn send_button(&self, button: MouseButton, down: bool, delay: Option<Duration>) -> Result<()> {
        let (pressed, released) = button.states();
        let state = if down { pressed } else { released };
        self.send_mouse(MouseStroke::button(state))?;
        self.sleeper
            .sleep(settle(delay, self.config.mouse_button_delay()));
        Ok(())
    }

    fn tap_key(&self, key: Key) -> Result<()> {
        self.send_key(key, true, None)?;
        self.send_key(key, false, None)
    }

    fn tap_button(&self, button: MouseButton) -> Result<()> {
        self.send_button(button, true, None)?;
        self.send_button(button, false, None)
    }

    /// Moves the cursor to a pixel position on the primary screen.
    ///
    /// The conversion to driver coordinates rounds, so the cursor may end up
    /// one pixel off on either axis.
    pub fn move_to(&self, x: i32, y: i32) -> Result<()> {
        let (ax, ay) = screen::to_absolute(x, y, self.screen.size()?);
        debug!("move_to ({x}, {y}) -> driver ({ax}, {ay})");
        self.send_mouse(MouseStroke::move_absolute(ax, ay))
    }

    /// Moves the cursor by the given amounts from where it is.
    pub fn move_relative(&self, dx: i32, dy: i32) -> Result<()> {
        self.send_mouse(MouseStroke::move_relative(dx, dy))
    }

    /// Current cursor position in pixels.
    pub fn mouse_position(&self) -> Result<(i32, i32)> {
        self.screen.cursor_position()
    }

    /// Clicks `button` `clicks` times, waiting `interval` between clicks.
    pub fn click(&self, button: &str, clicks: u32, interval: Duration) -> Result<()> {
        let button: MouseButton = button.parse()?;
        for i in 0..clicks {
            if i > 0 {
                self.sleeper.sleep(interval);
            }
            self.tap_button(button)?;
        }
        Ok(())
    }

    /// Moves to `(x, y)`, waits `delay`, then clicks like [`InputActions::click`].
    pub fn click_at(
        &self,
        x: i32,
        y: i32,
        button: &str,
        clicks: u32,
        interval: Duration,
        delay: Duration,
    ) -> Result<()> {
        // Resolve before moving so a bad name does not move the cursor.
        button.parse::<MouseButton>()?;
        self.move_to(x, y)?;
        self.sleeper.sleep(delay);
        self.click(button, clicks, interval)
    }

    pub fn left_click(&self, clicks: u32, interval: Duration) -> Result<()> {
        self.click(MouseButton::Left.name(), clicks, interval)
    }

    pub fn right_click(&self, clicks: u32, interval: Duration) -> Result<()> {
        self.click(MouseButton::Right.name(), clicks, interval)
    }

    /// Presses and releases `key` `presses` times, waiting `interval` between
    /// presses. Key names are case-insensitive.
    pub fn press(&self, key: &str, presses: u32, interval: Duration) -> Result<()> {
        let key = keys::resolve(key)?;
        for i in 0..presses {
            if i > 0 {
                self.sleeper.sleep(interval);
            }
            self.tap_key(key)?;
        }
        Ok(())
    }

    /// Types `text` one key at a time.
    ///
    /// Letters are always typed lowercase. Every character is resolved before
    /// the first key goes out.
    pub fn write(&self, text: &str, interval: Duration) -> Result<()> {
        let keys = text
            .to_lowercase()
            .chars()
            .map(keys::resolve_char)
            .collect::<Result<Vec<_>>>()?;

        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                self.sleeper.sleep(interval);
            }
            self.tap_key(key)?;
        }
        Ok(())
    }

    /// Turns the wheel one notch.
    pub fn scroll(&self, direction: ScrollDirection) -> Result<()> {
        self.send_mouse(MouseStroke::wheel(direction.rolling()))?;
        self.sleeper.sleep(self.config.scroll_delay());
        Ok(())
    }

    /// Presses `key` without releasing it. Prefer [`InputActions::hold_key`].
    pub fn key_down(&self, key: &str, delay: Option<Duration>) -> Result<()> {
        self.send_key(keys::resolve(key)?, true, delay)
    }

    pub fn key_up(&self, key: &str, delay: Option<Duration>) -> Result<()> {
        self.send_key(keys::resolve(key)?, false, delay)
    }

    /// Presses `button` without releasing it. Prefer [`InputActions::hold_mouse`].
    pub fn mouse_down(&self, button: &str, delay: Option<Duration>) -> Result<()> {
        self.send_button(button.parse()?, true, delay)
    }

    pub fn mouse_up(&self, button: &str, delay: Option<Duration>) -> Result<()> {
        self.send_button(button.parse()?, false, delay)
    }

    /// Presses `key` and returns a guard that releases it when dropped.
    pub fn hold_key(&self, key: &str) -> Result<KeyHold<'_, D>> {
        let key = keys::resolve(key)?;
        self.send_key(key, true, None)?;
        Ok(KeyHold {
            actions: self,
            key,
            released: false,
        })
    }

    /// Presses `button` and returns a guard that releases it when dropped.
    pub fn hold_mouse(&self, button: &str) -> Result<ButtonHold<'_, D>> {
        let button: MouseButton = button.parse()?;
        self.send_button(button, true, None)?;
        Ok(ButtonHold {
            actions: self,
            button,
            released: false,
        })
    }

    /// Runs `f` with `key` held down, releasing it whether or not `f` fails.
    pub fn with_key_held<T>(&self, key: &str, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let hold = self.hold_key(key)?;
        let outcome = f(self);
        let released = hold.release();
        let value = outcome?;
        released?;
        Ok(value)
    }

    /// Runs `f` with `button` held down, releasing it whether or not `f` fails.
    pub fn with_mouse_held<T>(
        &self,
        button: &str,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        let hold = self.hold_mouse(button)?;
        let outcome = f(self);
        let released = hold.release();
        let value = outcome?;
        released?;
        Ok(value)
    }
}

/// A pressed key, released on drop.
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct KeyHold<'a, D: Driver> {
    actions: &'a InputActions<D>,
    key: Key,
    released: bool,
}

impl<D: Driver> KeyHold<'_, D> {
    /// Releases now, reporting a failed release instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.actions.send_key(self.key, false, None)
    }
}

impl<D: Driver> Drop for KeyHold<'_, D> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.actions.send_key(self.key, false, None) {
                warn!("failed to release held key {:#04x}: {err}", self.key.code);
            }
        }
    }
}

/// A pressed mouse button, released on drop.
#[must_use = "the button is released as soon as the guard is dropped"]
pub struct ButtonHold<'a, D: Driver> {
    actions: &'a InputActions<D>,
    button: MouseButton,
    released: bool,
}

impl<D: Driver> ButtonHold<'_, D> {
    /// Releases now, reporting a failed release instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.actions.send_button(self.button, false, None)
    }
}

impl<D: Driver> Drop for ButtonHold<'_, D> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.actions.send_button(self.button, false, None) {
                warn!("failed to release held {} button: {err}", self.button);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{Journal, MockDriver, MockEvent};
    use crate::screen::FixedScreen;
    use crate::stroke::{
        KeyStroke, KEY_DOWN, KEY_E0, KEY_UP, MOUSE_LEFT_BUTTON_DOWN, MOUSE_LEFT_BUTTON_UP,
        MOUSE_MOVE_ABSOLUTE, MOUSE_RIGHT_BUTTON_DOWN, MOUSE_WHEEL,
    };

    const KEY_DELAY: Duration = Duration::from_millis(25);
    const BUTTON_DELAY: Duration = Duration::from_millis(30);

    fn actions() -> (InputActions<MockDriver>, MockDriver, Journal) {
        let driver = MockDriver::new();
        let journal = driver.journal();
        let context = Arc::new(Context::with_driver(driver.clone()));
        let actions = InputActions::with_context(context, InputConfig::default())
            .unwrap()
            .with_screen(FixedScreen::new(1920, 1080))
            .with_sleeper(driver.sleeper());
        (actions, driver, journal)
    }

    fn key(code: u16, state: u16) -> MockEvent {
        MockEvent::Sent {
            device: 1,
            stroke: Stroke::Key(KeyStroke::new(code, state)),
        }
    }

    fn button(state: u16) -> MockEvent {
        MockEvent::Sent {
            device: 11,
            stroke: Stroke::Mouse(MouseStroke::button(state)),
        }
    }

    #[test]
    fn press_sends_one_down_then_one_up() {
        let (actions, _driver, journal) = actions();
        actions.press("a", 1, DEFAULT_INTERVAL).unwrap();
        assert_eq!(
            journal.events(),
            vec![
                key(0x1E, KEY_DOWN),
                MockEvent::Slept(KEY_DELAY),
                key(0x1E, KEY_UP),
                MockEvent::Slept(KEY_DELAY),
            ]
        );
    }

    #[test]
    fn press_is_case_insensitive_and_marks_extended_keys() {
        let (actions, _driver, journal) = actions();
        actions.press("UP", 1, DEFAULT_INTERVAL).unwrap();
        assert_eq!(
            journal.sent(),
            vec![
                (1, Stroke::Key(KeyStroke::new(0x48, KEY_DOWN | KEY_E0))),
                (1, Stroke::Key(KeyStroke::new(0x48, KEY_UP | KEY_E0))),
            ]
        );
    }

    #[test]
    fn unknown_key_never_reaches_the_driver() {
        let (actions, driver, journal) = actions();
        assert!(matches!(
            actions.press("foo", 1, DEFAULT_INTERVAL),
            Err(InterceptionError::UnknownKey(name)) if name == "foo"
        ));
        assert!(matches!(
            actions.key_down("foo", None),
            Err(InterceptionError::UnknownKey(_))
        ));
        assert!(matches!(
            actions.click("thumb", 1, DEFAULT_INTERVAL),
            Err(InterceptionError::UnknownButton(_))
        ));
        assert!(matches!(
            actions.click_at(5, 5, "thumb", 1, DEFAULT_INTERVAL, DEFAULT_CLICK_DELAY),
            Err(InterceptionError::UnknownButton(_))
        ));
        assert!(matches!(
            actions.write("ab©", DEFAULT_WRITE_INTERVAL),
            Err(InterceptionError::UnknownKey(_))
        ));
        assert_eq!(driver.calls(), 0);
        assert!(journal.events().is_empty());
    }

    #[test]
    fn triple_click_has_two_gaps() {
        let (actions, _driver, journal) = actions();
        let interval = Duration::from_millis(100);
        actions.click("left", 3, interval).unwrap();

        let sent = journal.sent();
        assert_eq!(sent.len(), 6);
        for pair in sent.chunks(2) {
            assert_eq!(
                pair[0].1,
                Stroke::Mouse(MouseStroke::button(MOUSE_LEFT_BUTTON_DOWN))
            );
            assert_eq!(
                pair[1].1,
                Stroke::Mouse(MouseStroke::button(MOUSE_LEFT_BUTTON_UP))
            );
        }

        let events = journal.events();
        let gaps: Vec<_> = events
            .iter()
            .enumerate()
            .filter(|(_, event)| **event == MockEvent::Slept(interval))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(gaps.len(), 2);
        // Each gap sits between an up and the next down.
        for i in gaps {
            assert_eq!(events[i - 2], button(MOUSE_LEFT_BUTTON_UP));
            assert_eq!(events[i + 1], button(MOUSE_LEFT_BUTTON_DOWN));
        }
    }

    #[test]
    fn button_strokes_do_not_move_the_cursor() {
        let (actions, _driver, journal) = actions();
        actions.right_click(1, DEFAULT_INTERVAL).unwrap();
        let (_, first) = journal.sent()[0];
        let mouse = *first.as_mouse().unwrap();
        assert_eq!(mouse.state, MOUSE_RIGHT_BUTTON_DOWN);
        assert_eq!((mouse.flags, mouse.x, mouse.y), (0, 0, 0));
    }

    #[test]
    fn move_to_normalizes_pixels() {
        let (actions, _driver, journal) = actions();
        actions.move_to(960, 540).unwrap();
        actions.move_to(1920, 0).unwrap();
        assert_eq!(
            journal.sent(),
            vec![
                (11, Stroke::Mouse(MouseStroke::move_absolute(32768, 32768))),
                (11, Stroke::Mouse(MouseStroke::move_absolute(65535, 0))),
            ]
        );
        assert_eq!(journal.sent()[0].1.as_mouse().unwrap().flags, MOUSE_MOVE_ABSOLUTE);
    }

    #[test]
    fn click_at_moves_waits_then_clicks() {
        let (actions, _driver, journal) = actions();
        actions
            .click_at(0, 0, "left", 1, DEFAULT_INTERVAL, DEFAULT_CLICK_DELAY)
            .unwrap();
        let events = journal.events();
        assert_eq!(
            events[0],
            MockEvent::Sent {
                device: 11,
                stroke: Stroke::Mouse(MouseStroke::move_absolute(0, 0)),
            }
        );
        assert_eq!(events[1], MockEvent::Slept(DEFAULT_CLICK_DELAY));
        assert_eq!(events[2], button(MOUSE_LEFT_BUTTON_DOWN));
    }

    #[test]
    fn move_relative_and_scroll() {
        let (actions, _driver, journal) = actions();
        actions.move_relative(100, -20).unwrap();
        actions.scroll(ScrollDirection::Up).unwrap();
        actions.scroll(ScrollDirection::Down).unwrap();

        let sent = journal.sent();
        assert_eq!(sent[0].1, Stroke::Mouse(MouseStroke::move_relative(100, -20)));
        let wheel = sent[1].1.as_mouse().copied().unwrap();
        assert_eq!((wheel.state, wheel.rolling), (MOUSE_WHEEL, 120));
        assert_eq!(sent[2].1.as_mouse().unwrap().rolling, -120);
        assert_eq!(
            journal.sleeps(),
            vec![Duration::from_millis(25), Duration::from_millis(25)]
        );
    }

    #[test]
    fn write_types_lowercase_with_gaps_between_characters() {
        let (actions, _driver, journal) = actions();
        let interval = Duration::from_millis(50);
        actions.write("Hi 1", interval).unwrap();

        let codes: Vec<_> = journal
            .sent()
            .iter()
            .filter_map(|(_, stroke)| stroke.as_key().filter(|k| k.is_down()).map(|k| k.code))
            .collect();
        assert_eq!(codes, vec![0x23, 0x17, 0x39, 0x02]);
        let gaps = journal
            .sleeps()
            .into_iter()
            .filter(|&d| d == interval)
            .count();
        assert_eq!(gaps, 3);
    }

    #[test]
    fn delays_can_be_overridden_but_not_removed() {
        let (actions, _driver, journal) = actions();
        actions.key_down("a", Some(Duration::from_millis(80))).unwrap();
        actions.key_up("a", Some(Duration::ZERO)).unwrap();
        actions.mouse_down("left", None).unwrap();
        actions.mouse_up("left", Some(Duration::from_millis(5))).unwrap();
        assert_eq!(
            journal.sleeps(),
            vec![
                Duration::from_millis(80),
                KEY_DELAY,
                BUTTON_DELAY,
                Duration::from_millis(5),
            ]
        );
    }

    #[test]
    fn hold_guard_releases_on_drop() {
        let (actions, _driver, journal) = actions();
        {
            let _shift = actions.hold_key("shift").unwrap();
            actions.press("a", 1, DEFAULT_INTERVAL).unwrap();
        }
        let keys: Vec<_> = journal
            .sent()
            .into_iter()
            .map(|(_, stroke)| *stroke.as_key().unwrap())
            .collect();
        assert_eq!(
            keys,
            vec![
                KeyStroke::down(0x2A),
                KeyStroke::down(0x1E),
                KeyStroke::up(0x1E),
                KeyStroke::up(0x2A),
            ]
        );
    }

    #[test]
    fn held_button_is_released_when_the_action_fails() {
        let (actions, _driver, journal) = actions();
        let result = actions.with_mouse_held("left", |actions| {
            actions.move_relative(10, 0)?;
            actions.press("nope", 1, DEFAULT_INTERVAL)
        });
        assert!(matches!(result, Err(InterceptionError::UnknownKey(_))));

        let sent = journal.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent.last().unwrap().1,
            Stroke::Mouse(MouseStroke::button(MOUSE_LEFT_BUTTON_UP))
        );
    }

    #[test]
    fn with_key_held_returns_the_closure_value() {
        let (actions, _driver, journal) = actions();
        let value = actions
            .with_key_held("ctrl", |actions| {
                actions.press("c", 1, DEFAULT_INTERVAL)?;
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(
            journal.sent().last().unwrap().1,
            Stroke::Key(KeyStroke::up(0x1D))
        );
    }

    #[test]
    fn retargeting_validates_slot_kind() {
        let (actions, _driver, journal) = actions();
        assert!(matches!(
            actions.with_keyboard(12),
            Err(InterceptionError::InvalidDevice(12))
        ));
        assert!(matches!(
            actions.with_mouse(21),
            Err(InterceptionError::InvalidDevice(21))
        ));

        actions.with_keyboard(3).unwrap().press("a", 1, DEFAULT_INTERVAL).unwrap();
        actions.with_mouse(15).unwrap().move_relative(1, 1).unwrap();
        let devices: Vec<_> = journal.sent().iter().map(|(device, _)| *device).collect();
        assert_eq!(devices, vec![3, 3, 15]);
    }

    #[test]
    fn closed_context_surfaces_as_context_closed() {
        let (actions, _driver, _journal) = actions();
        actions.context().close();
        assert!(matches!(
            actions.press("a", 1, DEFAULT_INTERVAL),
            Err(InterceptionError::ContextClosed)
        ));
    }

    #[test]
    fn cursor_position_comes_from_the_screen() {
        let (actions, _driver, _journal) = actions();
        let actions = actions.with_screen(FixedScreen {
            width: 800,
            height: 600,
            cursor: (12, 34),
        });
        assert_eq!(actions.mouse_position().unwrap(), (12, 34));
    }

    #[cfg(not(windows))]
    #[test]
    fn native_actions_need_the_driver() {
        assert!(matches!(
            InputActions::new(InputConfig::default()),
            Err(InterceptionError::DriverNotFound)
        ));
    }
}
