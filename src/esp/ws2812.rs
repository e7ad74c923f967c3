use crate::wheel::Indicator;
use anyhow::Context;
use esp_idf_hal::{
    gpio::{AnyOutputPin, Output, PinDriver},
    peripheral::Peripheral,
    rmt::{config::TransmitConfig, FixedLengthSignal, PinState, Pulse, RmtChannel, TxRmtDriver},
};
use std::time::Duration;

/// A single WS2812 RGB LED driven by an RMT channel.
pub struct NeoPixel {
    tx: TxRmtDriver<'static>,
    one: (Pulse, Pulse),
    zero: (Pulse, Pulse),
    /// Some boards gate the LED's supply with a GPIO, which must stay high.
    _power: Option<PinDriver<'static, AnyOutputPin, Output>>,
}

const SIGNAL_LEN: usize = 24;

impl NeoPixel {
    pub fn new(
        data: AnyOutputPin,
        power: Option<AnyOutputPin>,
        channel: impl Peripheral<P = impl RmtChannel> + 'static,
    ) -> anyhow::Result<Self> {
        let power = power
            .map(|pin| -> anyhow::Result<_> {
                let mut pin = PinDriver::output(pin)?;
                pin.set_high()?;
                Ok(pin)
            })
            .transpose()
            .context("failed to power on NeoPixel")?;

        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, data, &config)
            .context("failed to initialize NeoPixel TX RMT driver")?;

        let ticks_hz = tx
            .counter_clock()
            .context("failed to get TX RMT driver counter clock")?;
        let pulse_nanos = |pin_state: PinState, nanos: u64| {
            Pulse::new_with_duration(ticks_hz, pin_state, &Duration::from_nanos(nanos))
                .with_context(|| format!("failed to construct pulse ({pin_state:?} for {nanos} ns)"))
        };
        let zero = (
            pulse_nanos(PinState::High, 350)?,
            pulse_nanos(PinState::Low, 800)?,
        );
        let one = (
            pulse_nanos(PinState::High, 700)?,
            pulse_nanos(PinState::Low, 600)?,
        );

        Ok(Self {
            tx,
            one,
            zero,
            _power: power,
        })
    }
}

impl Indicator for NeoPixel {
    fn set_color(&mut self, r: u8, g: u8, b: u8) -> anyhow::Result<()> {
        // the WS2812 wants green, then red, then blue, most significant bit
        // first.
        let grb = u32::from_be_bytes([0, g, r, b]);
        let mut signal = FixedLengthSignal::<SIGNAL_LEN>::new();
        for i in 0..SIGNAL_LEN {
            let bit = grb & (1 << (SIGNAL_LEN - 1 - i));
            let bit = if bit != 0 { self.one } else { self.zero };
            signal.set(i, &bit).context("failed to set signal bit")?;
        }

        self.tx
            .start_blocking(&signal)
            .context("failed to send blocking RMT signal")
    }
}
