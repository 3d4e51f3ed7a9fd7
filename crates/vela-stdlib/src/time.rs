//! The `time` module: wall clock, process clock, sleep, monotonic timestamps

use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use vela_engine::{CallCtx, InteropResult, NativeModule, Vm};

/// Fixed origin for `clock()` and `monotime()`, captured on first use.
static PROCESS_CLOCK: Lazy<Instant> = Lazy::new(Instant::now);

/// `time.epoch() -> number` — seconds since 1970-01-01 00:00:00 UTC.
fn time_epoch(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    ctx.set_number(0, secs);
    Ok(())
}

/// `time.clock() -> number` — seconds of process time since first use.
fn time_clock(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    ctx.set_number(0, PROCESS_CLOCK.elapsed().as_secs_f64());
    Ok(())
}

/// `time.sleep(ms: number)` — block the calling thread for `ms` milliseconds.
fn time_sleep(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    let ms = ctx.get_number(1)?;
    if ms > 0.0 {
        thread::sleep(Duration::from_micros((ms * 1000.0) as u64));
    }
    Ok(())
}

/// `time.monotime() -> number` — monotonic timestamp in nanoseconds.
fn time_monotime(ctx: &mut CallCtx<'_>) -> InteropResult<()> {
    ctx.set_number(0, PROCESS_CLOCK.elapsed().as_nanos() as f64);
    Ok(())
}

/// Register the `time` module on `vm`.
pub fn register(vm: &mut Vm) -> InteropResult<()> {
    let mut module = NativeModule::new("time");
    module.add_function("epoch", time_epoch, 0);
    module.add_function("sleep", time_sleep, 1);
    module.add_function("clock", time_clock, 0);
    module.add_function("monotime", time_monotime, 0);
    vm.register_module(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_engine::Value;

    fn vm_with_time() -> Vm {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut vm = Vm::new();
        register(&mut vm).unwrap();
        vm
    }

    #[test]
    fn test_epoch_is_current() {
        let mut vm = vm_with_time();
        match vm.call_exported("time", "epoch", &[]).unwrap() {
            // 2023-01-01 in epoch seconds; anything earlier means a broken clock.
            Value::Number(n) => assert!(n > 1_672_531_200.0),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_monotime_is_monotonic() {
        let mut vm = vm_with_time();
        let a = vm.call_exported("time", "monotime", &[]).unwrap();
        let b = vm.call_exported("time", "monotime", &[]).unwrap();
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => assert!(b >= a),
            other => panic!("expected numbers, got {other:?}"),
        }
    }

    #[test]
    fn test_sleep_blocks() {
        let mut vm = vm_with_time();
        let start = Instant::now();
        let out = vm
            .call_exported("time", "sleep", &[Value::Number(10.0)])
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(out, Value::Nil);
    }

    #[test]
    fn test_sleep_requires_a_number() {
        let mut vm = vm_with_time();
        let s = vm.make_string("soon");
        let err = vm.call_exported("time", "sleep", &[s]).unwrap_err();
        assert!(err.message.contains("expected number at slot 1"));
    }

    #[test]
    fn test_clock_advances() {
        let mut vm = vm_with_time();
        let a = vm.call_exported("time", "clock", &[]).unwrap();
        thread::sleep(Duration::from_millis(2));
        let b = vm.call_exported("time", "clock", &[]).unwrap();
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => assert!(b > a),
            other => panic!("expected numbers, got {other:?}"),
        }
    }
}
