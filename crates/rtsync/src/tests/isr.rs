use std::time::Duration;

use crate::event_flag::{EventFlags, WaitMode};
use crate::kernel::{self, Ticks};
use crate::message_queue::MessageQueue;
use crate::semaphore::Semaphore;

#[test]
fn wakes_from_nested_handlers_wait_for_outermost_exit() {
    let flags = EventFlags::new();
    kernel::run_as_isr(|| {
        kernel::run_as_isr(|| {
            flags.set(0b01);
        });
        assert!(kernel::is_isr_context());
        flags.set(0b10);
    });
    assert_eq!(flags.wait(0b11, WaitMode::ALL, Ticks::ZERO), Ok(0b11));
}

#[test]
fn isr_feeds_queue_consumed_by_thread() {
    let queue = MessageQueue::new(8);
    let consumer = {
        let queue = queue.clone();
        std::thread::spawn(move || {
            (0..3)
                .map(|_| queue.get(Ticks(2_000)))
                .collect::<Result<Vec<u32>, _>>()
        })
    };

    std::thread::sleep(Duration::from_millis(10));
    for value in 1..=3 {
        assert!(kernel::run_as_isr(|| queue.put(value, Ticks::ZERO).is_ok()));
    }
    assert_eq!(consumer.join().unwrap(), Ok(vec![1, 2, 3]));
}

#[test]
fn isr_signal_and_semaphore_in_one_handler() {
    let ready = Semaphore::binary();
    let flags = EventFlags::new();
    let waiter = {
        let ready = ready.clone();
        let flags = flags.clone();
        std::thread::spawn(move || {
            ready.acquire(Ticks(2_000))?;
            flags.wait(0b100, WaitMode::ANY, Ticks(2_000))
        })
    };

    kernel::run_as_isr(|| {
        flags.set(0b100);
        ready.release().unwrap();
    });
    assert_eq!(waiter.join().unwrap(), Ok(0b100));
}

#[test]
#[should_panic(expected = "interrupt context")]
fn delay_in_isr_is_fatal() {
    kernel::run_as_isr(|| kernel::delay(Ticks(1)));
}
