//! Tour of the rtsync primitives.
//!
//! Shows timed locking, semaphores released from an interrupt handler, event
//! groups, a rendezvous between two threads, a dispatcher consumer thread and
//! a periodic timer.

use std::sync::Arc;

use rtsync::kernel;
use rtsync::{
    alloc_locked, Dispatcher, DispatcherThread, EventFlags, Mutex, PubSub, Semaphore, SyncError,
    ThreadConfig, Ticks, Timer, TimerKind, WaitMode,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    println!("=== rtsync primitives ===\n");

    demo_mutex();
    demo_semaphore();
    demo_event_flags();
    demo_api_lock();
    demo_dispatcher();
    demo_pubsub();
    demo_timer();
}

fn demo_mutex() {
    println!("1. Mutex");

    let counter = Arc::new(Mutex::new(0u32));
    let held = counter.lock();
    let contender = counter.clone();
    let result = std::thread::spawn(move || contender.acquire(Ticks(5)).map(|_| ()))
        .join()
        .unwrap_or(Err(SyncError::Resource));
    println!("   contended acquire while held: {result:?}");
    drop(held);

    *counter.acquire(Ticks::FOREVER).unwrap() += 1;
    println!("   value after release: {}\n", *counter.lock());
}

fn demo_semaphore() {
    println!("2. Semaphore released from an interrupt");

    let sem = Semaphore::binary();
    let waiter = sem.clone();
    let handle = std::thread::spawn(move || waiter.acquire(Ticks(1_000)));

    kernel::run_as_isr(|| {
        sem.release().unwrap();
        println!("   isr: released, wake deferred until handler returns");
    });
    println!("   waiter: {:?}\n", handle.join().unwrap());
}

fn demo_event_flags() {
    println!("3. Event flags");

    let flags = EventFlags::new();
    flags.set(0b0011);
    println!("   flags: {:#06b}", flags.get());
    println!(
        "   wait ALL 0b0111, no wait: {:?}",
        flags.wait(0b0111, WaitMode::ALL, Ticks::ZERO)
    );
    println!(
        "   wait ANY 0b0001: {:?}",
        flags.wait(0b0001, WaitMode::ANY, Ticks::ZERO)
    );
    println!("   flags after auto-clear: {:#06b}\n", flags.get());
}

fn demo_api_lock() {
    println!("4. Rendezvous");

    let (lock, signal) = alloc_locked();
    std::thread::spawn(move || {
        kernel::delay(Ticks::from_millis(10));
        signal.signal(String::from("work finished"));
    });
    println!("   caller got: {:?}\n", lock.wait_and_free(Ticks::FOREVER));
}

fn demo_dispatcher() {
    println!("5. Dispatcher");

    let dispatcher = Arc::new(Dispatcher::default());
    let consumer = DispatcherThread::spawn(dispatcher.clone(), ThreadConfig::new("dispatcher"));

    for index in 0..3 {
        let queued = dispatcher.dispatch(
            move || println!("   job {index} on {}", kernel::current_thread_id()),
            Ticks(10),
        );
        if let Err(err) = queued {
            println!("   job {index} dropped: {err}");
        }
    }
    consumer.stop();
    println!();
}

fn demo_pubsub() {
    println!("6. PubSub");

    let pubsub = PubSub::<&'static str>::new();
    let first = pubsub.subscribe(|message| println!("   first  <- {message}"));
    let second = pubsub.subscribe(|message| println!("   second <- {message}"));
    pubsub.publish(&"hello");
    pubsub.unsubscribe(first);
    pubsub.publish(&"again");
    pubsub.unsubscribe(second);
    println!();
}

fn demo_timer() {
    println!("7. Timer");

    let ticks = Arc::new(Semaphore::new(3, 0));
    let sink = ticks.clone();
    let timer = Timer::new(TimerKind::Periodic, Ticks::from_millis(20), move || {
        println!("   tick on {}", kernel::current_thread_id());
        let _ = sink.release();
    });
    if let Err(err) = timer.start() {
        println!("   timer not started: {err}");
        return;
    }
    for _ in 0..3 {
        let _ = ticks.acquire(Ticks::from_millis(500));
    }
    timer.stop();
    println!("   stopped, running: {}", timer.is_running());
}
