//! Integration tests for service threads with blocking primitives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use rtsync::{
    alloc_locked, ActiveBehavior, ActiveObject, ApiSignal, EventFlags, Flow, Mutex, MessageQueue,
    PubSub, RecursiveMutex, Semaphore, Thread, ThreadConfig, ThreadState, Ticks, WaitMode,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn thread_blocks_on_semaphore_until_released() {
    init_logger();
    let sem = Semaphore::new(1, 0);
    let waiter = sem.clone();

    let mut thread = Thread::spawn(ThreadConfig::new("sem-waiter"), move || {
        match waiter.acquire(Ticks(2_000)) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    });

    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(thread.state(), ThreadState::Running);
    sem.release().unwrap();
    assert_eq!(thread.join(), 0);
}

#[test]
fn producer_consumer_over_message_queue() {
    init_logger();
    let queue = MessageQueue::new(2);
    let consumed = Arc::new(StdMutex::new(Vec::new()));

    let mut consumer = {
        let queue = queue.clone();
        let consumed = consumed.clone();
        Thread::spawn(ThreadConfig::new("consumer"), move || {
            loop {
                match queue.get(Ticks(2_000)) {
                    Ok(0u32) => return 0,
                    Ok(value) => consumed.lock().unwrap().push(value),
                    Err(_) => return 1,
                }
            }
        })
    };

    for value in 1..=10 {
        queue.put(value, Ticks(2_000)).unwrap();
    }
    queue.put(0, Ticks(2_000)).unwrap();

    assert_eq!(consumer.join(), 0);
    assert_eq!(*consumed.lock().unwrap(), (1..=10).collect::<Vec<_>>());
}

#[test]
fn mutex_serializes_workers() {
    let shared = Arc::new(Mutex::new(0u64));
    let mut workers: Vec<Thread> = (0..4)
        .map(|n| {
            let shared = shared.clone();
            Thread::spawn(ThreadConfig::new(format!("worker-{n}")), move || {
                for _ in 0..500 {
                    *shared.lock() += 1;
                }
                0
            })
        })
        .collect();

    for worker in &mut workers {
        assert_eq!(worker.join(), 0);
    }
    assert_eq!(*shared.lock(), 2_000);
}

#[test]
fn recursive_lock_held_across_fan_out() {
    // A publisher holds the display lock while subscribers on the same thread
    // take it again to draw.
    let display = Arc::new(RecursiveMutex::new(std::cell::RefCell::new(Vec::new())));
    let pubsub = PubSub::<&'static str>::new();

    let drawer = {
        let display = display.clone();
        pubsub.subscribe(move |event| {
            let surface = display.lock();
            surface.borrow_mut().push(*event);
        })
    };

    {
        let guard = display.lock();
        guard.borrow_mut().push("begin");
        pubsub.publish(&"showing");
        assert_eq!(display.depth(), 1);
    }
    pubsub.unsubscribe(drawer);

    assert_eq!(*display.lock().borrow(), vec!["begin", "showing"]);
}

struct Counter {
    handled: Arc<AtomicUsize>,
}

enum CounterMsg {
    Bump(Option<ApiSignal<usize>>),
    Stop,
}

impl ActiveBehavior for Counter {
    type Message = CounterMsg;

    fn on_message(&mut self, message: CounterMsg) -> Flow {
        match message {
            CounterMsg::Bump(reply) => {
                let handled = self.handled.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(reply) = reply {
                    reply.signal(handled);
                }
                Flow::Continue
            }
            CounterMsg::Stop => Flow::Exit,
        }
    }
}

#[test]
fn concurrent_callers_are_serialized_by_actor() {
    init_logger();
    let handled = Arc::new(AtomicUsize::new(0));
    let actor = Arc::new(ActiveObject::spawn(
        ThreadConfig::new("counter"),
        1,
        Counter {
            handled: handled.clone(),
        },
    ));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let actor = actor.clone();
            std::thread::spawn(move || {
                let mut replies = Vec::new();
                for _ in 0..25 {
                    let (lock, signal) = alloc_locked();
                    assert!(actor.post(CounterMsg::Bump(Some(signal)), Ticks::FOREVER).is_ok());
                    replies.push(lock.wait_and_free(Ticks(5_000)).unwrap());
                }
                replies
            })
        })
        .collect();

    let mut all: Vec<usize> = callers
        .into_iter()
        .flat_map(|caller| caller.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (1..=100).collect::<Vec<_>>());

    assert!(actor.post(CounterMsg::Stop, Ticks::FOREVER).is_ok());
    let mut actor = Arc::try_unwrap(actor).ok().expect("callers joined");
    assert_eq!(actor.join(), 0);
    assert_eq!(handled.load(Ordering::SeqCst), 100);
}

#[test]
fn event_flags_gate_worker_start() {
    let go = EventFlags::new();
    let observed = Arc::new(AtomicUsize::new(0));

    let mut workers: Vec<Thread> = (0..3u32)
        .map(|bit| {
            let go = go.clone();
            let observed = observed.clone();
            Thread::spawn(ThreadConfig::new(format!("gated-{bit}")), move || {
                match go.wait(1 << bit, WaitMode::ANY, Ticks(2_000)) {
                    Ok(_) => {
                        observed.fetch_add(1, Ordering::SeqCst);
                        0
                    }
                    Err(_) => 1,
                }
            })
        })
        .collect();

    go.set(0b111);
    for worker in &mut workers {
        assert_eq!(worker.join(), 0);
    }
    assert_eq!(observed.load(Ordering::SeqCst), 3);
}
