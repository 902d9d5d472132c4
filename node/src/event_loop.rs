use std::{collections::VecDeque, time::Instant};

use peerlink_shared::{ConnectionConfig, Id, PeriodicTimer};

use crate::{
    container::ContainerCommand, dispatch::MessagePayload, events::InterestEvent,
    transport::LinkKey,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Discovery,
    Heartbeat,
}

/// One unit of work on the node's single thread
pub(crate) enum Task {
    LinkOpened(LinkKey),
    LinkClosed(LinkKey),
    PacketReceived(LinkKey, Box<[u8]>),
    NewPeer(Id),
    PeerLeft(Id),
    InterestChanged(InterestEvent),
    Publish {
        topic: String,
        message: Box<dyn MessagePayload>,
    },
    Container(ContainerCommand),
    Timer(TimerKind),
}

/// FIFO task queue plus the node's periodic timers
pub(crate) struct EventLoop {
    tasks: VecDeque<Task>,
    discovery_timer: PeriodicTimer,
    heartbeat_timer: PeriodicTimer,
}

impl EventLoop {
    pub(crate) fn new(config: &ConnectionConfig, now: Instant) -> Self {
        Self {
            tasks: VecDeque::new(),
            discovery_timer: PeriodicTimer::new(config.discovery_retry_interval, now),
            heartbeat_timer: PeriodicTimer::new(config.heartbeat_interval, now),
        }
    }

    pub(crate) fn schedule(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Queues `tasks` ahead of everything already waiting, keeping their
    /// relative order
    pub(crate) fn schedule_next(&mut self, tasks: Vec<Task>) {
        for task in tasks.into_iter().rev() {
            self.tasks.push_front(task);
        }
    }

    pub(crate) fn next_task(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Queues a timer task for every timer whose deadline has passed
    pub(crate) fn poll_timers(&mut self, now: Instant) {
        if self.discovery_timer.poll(now) {
            self.schedule(Task::Timer(TimerKind::Discovery));
        }
        if self.heartbeat_timer.poll(now) {
            self.schedule(Task::Timer(TimerKind::Heartbeat));
        }
    }

    /// The earliest instant at which a timer will fire
    pub(crate) fn next_deadline(&self) -> Instant {
        self.discovery_timer
            .next_deadline()
            .min(self.heartbeat_timer.next_deadline())
    }
}
