//! Fuzz target: pulse edge handler
//!
//! Feeds arbitrary edge timestamps (wrapping u32 ticks) into a
//! `PulseCounter`, interleaved with clears, and verifies:
//! - No panics or overflow on any tick sequence
//! - The count equals the edges seen since the last clear
//! - Instant power is 0 or within the configured wattage range
//!
//! cargo fuzz run fuzz_pulse_edges

#![no_main]

use libfuzzer_sys::fuzz_target;
use powermeter::config::MeterConfig;
use powermeter::metering::{EdgeInput, PulseCounter, PulseMeter};

struct NoEdge;

impl EdgeInput for NoEdge {
    type Error = ();

    fn attach(&mut self, _counter: &'static PulseCounter) -> Result<(), ()> {
        Ok(())
    }
}

static COUNTER: PulseCounter = PulseCounter::new(&MeterConfig::DEFAULT);

fuzz_target!(|data: &[u8]| {
    let config = MeterConfig::DEFAULT;
    let Ok(mut meter) = PulseMeter::init(&COUNTER, &mut NoEdge, &config, 0) else {
        return;
    };

    let mut now = 0u32;
    let mut expected = 0u32;
    for chunk in data.chunks_exact(4) {
        let step = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        // Top and bottom bit both set: clear instead of an edge.
        if step & 0x8000_0000 != 0 && step & 1 == 1 {
            meter.clear();
            expected = 0;
            continue;
        }
        now = now.wrapping_add(step);
        COUNTER.on_edge(now);
        expected = expected.wrapping_add(1);

        let snap = meter.snapshot();
        assert_eq!(snap.pulse_count, expected);
        assert!(
            snap.instant_power_w == 0
                || (config.min_watts..=config.max_watts).contains(&snap.instant_power_w)
        );
        let _ = meter.update(now);
    }
});
