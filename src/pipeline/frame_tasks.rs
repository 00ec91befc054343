use crossbeam_channel::{Receiver, Sender, unbounded};
use log::trace;

/// A deferred operation run on the render thread against its context `C`.
pub type FrameTask<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Single-consumer FIFO moving work onto the render thread.
///
/// Any number of [`FrameTaskSender`]s may push from any thread; only the
/// owner of the queue drains it, once per frame.
pub struct FrameTaskQueue<C> {
    tx: Sender<FrameTask<C>>,
    rx: Receiver<FrameTask<C>>,
}

/// Producer half of a [`FrameTaskQueue`].
pub struct FrameTaskSender<C> {
    tx: Sender<FrameTask<C>>,
}

impl<C> Clone for FrameTaskSender<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> FrameTaskSender<C> {
    /// Queues `task`. Returns false when the queue has been dropped.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

impl<C> Default for FrameTaskQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> FrameTaskQueue<C> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> FrameTaskSender<C> {
        FrameTaskSender {
            tx: self.tx.clone(),
        }
    }

    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        // The queue holds a receiver, so this send cannot fail.
        let _ = self.tx.send(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Runs the tasks queued before this call, in submission order.
    ///
    /// Tasks submitted while draining stay queued for the next call.
    /// Returns how many tasks ran.
    pub fn drain(&self, context: &mut C) -> usize {
        let pending = self.rx.len();
        let mut ran = 0;
        for task in self.rx.try_iter().take(pending) {
            task(context);
            ran += 1;
        }
        if ran > 0 {
            trace!("Ran {ran} frame task(s)");
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn tasks_run_in_submission_order() {
        let queue = FrameTaskQueue::<Vec<u32>>::new();
        for i in 0..5 {
            queue.submit(move |log: &mut Vec<u32>| log.push(i));
        }
        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 5);
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_submitted_during_a_drain_wait_for_the_next_one() {
        let queue = FrameTaskQueue::<Vec<&'static str>>::new();
        let sender = queue.sender();
        queue.submit(move |log: &mut Vec<&'static str>| {
            log.push("first");
            sender.submit(|log: &mut Vec<&'static str>| log.push("deferred"));
        });

        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 1);
        assert_eq!(log, vec!["first"]);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain(&mut log), 1);
        assert_eq!(log, vec!["first", "deferred"]);
    }

    #[test]
    fn producers_on_other_threads() {
        let queue = FrameTaskQueue::<u32>::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sender = queue.sender();
                thread::spawn(move || {
                    for _ in 0..10 {
                        assert!(sender.submit(|count: &mut u32| *count += 1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut count = 0;
        queue.drain(&mut count);
        assert_eq!(count, 40);
    }

    #[test]
    fn submit_reports_a_dropped_queue() {
        let queue = FrameTaskQueue::<()>::new();
        let sender = queue.sender();
        drop(queue);
        assert!(!sender.submit(|_| {}));
    }
}
