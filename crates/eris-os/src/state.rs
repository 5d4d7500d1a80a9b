use std::sync::Arc;

use eris_gpio::GpioManager;
use eris_gpio::chip::Chip;

use crate::watchdog::Watchdog;

/// Names of the lines wired for hardware-in-the-loop tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestGpios {
    /// A line suitable for input tests.
    pub input: Option<String>,
    /// A line suitable for output tests.
    pub output: Option<String>,
}

/// The state handed to every command handler.
///
/// Clones share the GPIO reservations. [`ApiState::fork`] gives a TCP
/// session its own reservations.
pub struct ApiState<C: Chip> {
    /// GPIO resource manager.
    pub gpio: GpioManager<C>,
    /// Hardware watchdog, if any.
    pub watchdog: Option<Arc<Watchdog>>,
    /// Test lines.
    pub test_gpios: Arc<TestGpios>,
}

impl<C: Chip> Clone for ApiState<C> {
    fn clone(&self) -> Self {
        Self {
            gpio: self.gpio.clone(),
            watchdog: self.watchdog.clone(),
            test_gpios: Arc::clone(&self.test_gpios),
        }
    }
}

impl<C: Chip> std::fmt::Debug for ApiState<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("gpio", &self.gpio)
            .field("watchdog", &self.watchdog)
            .field("test_gpios", &self.test_gpios)
            .finish()
    }
}

impl<C: Chip> ApiState<C> {
    /// Creates an [`ApiState`] around a GPIO manager.
    #[must_use]
    pub fn new(gpio: GpioManager<C>) -> Self {
        Self {
            gpio,
            watchdog: None,
            test_gpios: Arc::new(TestGpios::default()),
        }
    }

    /// Sets the hardware watchdog.
    #[must_use]
    #[inline]
    pub fn watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = Some(Arc::new(watchdog));
        self
    }

    /// Sets the test lines.
    #[must_use]
    #[inline]
    pub fn test_gpios(mut self, test_gpios: TestGpios) -> Self {
        self.test_gpios = Arc::new(test_gpios);
        self
    }

    /// Creates a state with no GPIO reservation, sharing everything else.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            gpio: self.gpio.fork(),
            watchdog: self.watchdog.clone(),
            test_gpios: Arc::clone(&self.test_gpios),
        }
    }
}
