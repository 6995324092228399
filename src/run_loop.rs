// maplibre-jni/src/run_loop.rs
//
//! The asynchronous work pump the driver runs once per tick.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex};

/// Pending asynchronous work: completed network requests, expired timers and the like.
pub trait RunLoop {
    /// Processes whatever is ready right now, without blocking.
    fn run_once(&mut self);

    /// Drops everything queued and refuses whatever is posted afterwards.
    fn stop(&mut self);
}

type Task = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct TaskQueue {
    tasks: VecDeque<Task>,
    stopped: bool,
}

/// A run loop fed through [`RunLoopHandle`]s from any thread, drained on the render thread.
#[derive(Default)]
pub struct TaskRunLoop {
    queue: Arc<Mutex<TaskQueue>>,
}

/// Posts tasks to a [`TaskRunLoop`].
#[derive(Clone)]
pub struct RunLoopHandle {
    queue: Arc<Mutex<TaskQueue>>,
}

impl TaskRunLoop {
    pub fn new() -> TaskRunLoop {
        TaskRunLoop::default()
    }

    pub fn handle(&self) -> RunLoopHandle {
        RunLoopHandle { queue: self.queue.clone() }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|queue| queue.tasks.len()).unwrap_or(0)
    }
}

impl RunLoop for TaskRunLoop {
    // Only tasks queued before the call run; tasks they post wait for the next tick.
    fn run_once(&mut self) {
        let tasks = match self.queue.lock() {
            Ok(mut queue) => mem::take(&mut queue.tasks),
            Err(_) => {
                error!("Run loop queue poisoned; skipping");
                return;
            }
        };
        for task in tasks {
            task();
        }
    }

    fn stop(&mut self) {
        let dropped = match self.queue.lock() {
            Ok(mut queue) => {
                queue.stopped = true;
                mem::take(&mut queue.tasks)
            }
            Err(_) => return,
        };
        debug!("Run loop stopped with {} tasks pending", dropped.len());
    }
}

impl RunLoopHandle {
    /// Queues `task` for the next `run_once`. Returns false once the loop is stopped.
    pub fn post<F>(&self, task: F) -> bool where F: FnOnce() + Send + 'static {
        let mut queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(_) => return false,
        };
        if queue.stopped {
            return false;
        }
        queue.tasks.push_back(Box::new(task));
        true
    }
}
