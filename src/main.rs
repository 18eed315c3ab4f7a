//! Fan firmware: keypad in the foreground, wind patterns and the
//! temperature interlock in the background.

#![no_main]
#![no_std]

use core::sync::atomic::{AtomicUsize, Ordering};

use breeze_firmware::{dht::Stopwatch, display::StatusDisplay, ControlState};
use cortex_m::peripheral::DWT;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use embedded_hal::blocking::delay::DelayMs;
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, Ssd1306};
use stm32f1xx_hal::{
    gpio::{
        gpiob::{PB6, PB7},
        Alternate, OpenDrain,
    },
    i2c::BlockingI2c,
    pac,
};

// global logger
use defmt_rtt as _;
use panic_probe as _;

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is
// invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

static COUNT: AtomicUsize = AtomicUsize::new(0);
defmt::timestamp!("{=usize}", {
    // NOTE(no-CAS) `timestamps` runs with interrupts disabled
    let n = COUNT.load(Ordering::Relaxed);
    COUNT.store(n + 1, Ordering::Relaxed);
    n
});

static STATE: ControlState = ControlState::new();

type I2c = BlockingI2c<
    pac::I2C1,
    (PB6<Alternate<OpenDrain>>, PB7<Alternate<OpenDrain>>),
>;

type OledDriver = Ssd1306<
    I2CInterface<I2c>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// SSD1306 framebuffer behind the status-screen interface. Bus errors are
/// dropped; the next tick redraws everything anyway.
pub struct Oled {
    display: OledDriver,
}

impl Oled {
    pub fn new(mut display: OledDriver) -> Self {
        if display.init().is_err() {
            defmt::warn!("oled init failed");
        }
        Self { display }
    }
}

impl StatusDisplay for Oled {
    fn clear(&mut self) {
        self.display.clear();
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str) {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.display)
            .ok();
    }

    fn flush(&mut self) {
        self.display.flush().ok();
    }
}

/// DWT cycle counter; wraps every ~60 s at 72 MHz, which only matters for
/// pulses far longer than any the sensor sends.
pub struct CycleCounter {
    ticks_per_us: u32,
}

impl Stopwatch for CycleCounter {
    fn ticks(&self) -> u32 {
        DWT::cycle_count()
    }

    fn ticks_per_us(&self) -> u32 {
        self.ticks_per_us
    }
}

/// Busy-wait delay for the sensor start signal; SysTick belongs to the
/// monotonic.
pub struct CycleDelay {
    ticks_per_us: u32,
}

impl DelayMs<u32> for CycleDelay {
    fn delay_ms(&mut self, ms: u32) {
        cortex_m::asm::delay(ms.saturating_mul(1_000 * self.ticks_per_us));
    }
}

#[rtic::app(device = stm32f1xx_hal::pac, peripherals = true, dispatchers = [USART1, USART2])]
mod app {
    use breeze_firmware::{
        consts::{ENGINE_TICK_MS, PWM_FREQ_HZ, SCAN_PERIOD_MS},
        controller::{Motor, PwmMotor},
        dht::Dht,
        dispatch::{self, Effect},
        display::render_status,
        keypad::{Keypad, Polarity, KEYMAP},
        models::{EngineWriter, InputWriter},
        wind::WindEngine,
        Config,
    };
    use ssd1306::{prelude::*, I2CDisplayInterface, Ssd1306};
    use stm32f1xx_hal::{
        gpio::{gpioa::PA1, ErasedPin, Input, OpenDrain, Output, PullUp, PushPull},
        i2c::{BlockingI2c, DutyCycle, Mode},
        pac,
        prelude::*,
        timer::{PwmChannel, Tim3NoRemap, C1},
    };
    use systick_monotonic::{fugit::ExtU64, Systick};

    use super::{CycleCounter, CycleDelay, Oled, STATE};

    type MotorChannel = PwmChannel<pac::TIM3, C1>;
    type Rows = ErasedPin<Output<PushPull>>;
    type Cols = ErasedPin<Input<PullUp>>;
    type Sensor = Dht<PA1<Output<OpenDrain>>, CycleDelay, CycleCounter>;

    #[monotonic(binds = SysTick, default = true)]
    type MonoTimer = Systick<1000>;

    #[shared]
    struct Shared {
        motor: PwmMotor<MotorChannel>,
    }

    #[local]
    struct Local {
        keypad: Keypad<Rows, Cols>,
        input: InputWriter<'static>,
        port: EngineWriter<'static>,
        sensor: Sensor,
        engine: WindEngine,
        oled: Oled,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut cp = cx.core;
        let dp = cx.device;

        let mut flash = dp.FLASH.constrain();
        let rcc = dp.RCC.constrain();
        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(72.MHz())
            .pclk1(36.MHz())
            .freeze(&mut flash.acr);
        let ticks_per_us = clocks.sysclk().raw() / 1_000_000;

        cp.DCB.enable_trace();
        cp.DWT.enable_cycle_counter();
        let mono = Systick::new(cp.SYST, clocks.sysclk().raw());

        let config = Config::default();
        defmt::info!("config {}", config);

        let mut afio = dp.AFIO.constrain();
        let mut gpioa = dp.GPIOA.split();
        let mut gpiob = dp.GPIOB.split();

        // motor: TIM3 CH1
        let pa6 = gpioa.pa6.into_alternate_push_pull(&mut gpioa.crl);
        let pwm = dp.TIM3.pwm_hz::<Tim3NoRemap, _, _>(
            pa6,
            &mut afio.mapr,
            PWM_FREQ_HZ.Hz(),
            &clocks,
        );
        let mut motor = PwmMotor::new(pwm.split());
        motor.enable();

        // keypad: rows driven low to select, pulled-up columns
        let rows = [
            gpiob.pb12.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb13.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb14.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb15.into_push_pull_output(&mut gpiob.crh).erase(),
        ];
        let cols = [
            gpiob.pb0.into_pull_up_input(&mut gpiob.crl).erase(),
            gpiob.pb1.into_pull_up_input(&mut gpiob.crl).erase(),
            gpiob.pb10.into_pull_up_input(&mut gpiob.crh).erase(),
            gpiob.pb11.into_pull_up_input(&mut gpiob.crh).erase(),
        ];
        let keypad =
            Keypad::new(rows, cols, KEYMAP, Polarity::ActiveLow, config.debounce_ms);

        // sensor data line, external pull-up
        let data = gpioa.pa1.into_open_drain_output(&mut gpioa.crl);
        let sensor = Dht::new(
            data,
            CycleDelay { ticks_per_us },
            CycleCounter { ticks_per_us },
            &config,
        );

        // status display on I2C1
        let scl = gpiob.pb6.into_alternate_open_drain(&mut gpiob.crl);
        let sda = gpiob.pb7.into_alternate_open_drain(&mut gpiob.crl);
        let i2c = BlockingI2c::i2c1(
            dp.I2C1,
            (scl, sda),
            &mut afio.mapr,
            Mode::Fast {
                frequency: 400.kHz(),
                duty_cycle: DutyCycle::Ratio2to1,
            },
            clocks,
            1000,
            10,
            1000,
            1000,
        );
        let oled = Oled::new(
            Ssd1306::new(
                I2CDisplayInterface::new(i2c),
                DisplaySize128x64,
                DisplayRotation::Rotate0,
            )
            .into_buffered_graphics_mode(),
        );

        let (input, port) = STATE.split().unwrap();

        scan::spawn().ok();
        wind::spawn().ok();
        defmt::info!("breeze up");

        (
            Shared { motor },
            Local {
                keypad,
                input,
                port,
                sensor,
                engine: WindEngine::new(&config),
                oled,
            },
            init::Monotonics(mono),
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    /// Scheduler time. Falls slightly behind wall time while a sensor
    /// capture holds interrupts off.
    fn now_ms() -> u32 {
        monotonics::now().ticks() as u32
    }

    /// Foreground: scan the keypad and apply the mapped action.
    #[task(priority = 2, shared = [motor], local = [keypad, input])]
    fn scan(mut cx: scan::Context) {
        if let Some(key) = cx.local.keypad.scan(now_ms()) {
            if let Effect::ApplyDuty(percent) = dispatch::dispatch(key, cx.local.input) {
                cx.shared.motor.lock(|motor| motor.set_duty(percent));
            }
        }
        scan::spawn_after(SCAN_PERIOD_MS.millis()).ok();
    }

    /// Background: sensor, pattern, interlock, motor, display.
    #[task(priority = 1, shared = [motor], local = [sensor, port, engine, oled])]
    fn wind(mut cx: wind::Context) {
        let (output, view) =
            cx.local
                .engine
                .tick(now_ms(), cx.local.sensor, cx.local.port);
        cx.shared.motor.lock(|motor| motor.set_duty(output.duty));
        render_status(cx.local.oled, &view);
        wind::spawn_after(ENGINE_TICK_MS.millis()).ok();
    }
}
