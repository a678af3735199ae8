//! Channel tee: one input stream fanned out to a dynamic set of subscribers
//!
//! Every item written to the input is sent, in registration order, to every
//! registered subscriber. Sends block on each subscriber in turn, so a
//! subscriber that stops reading stalls the whole tee until it is removed.
//!
//! Removing a subscriber has to cope with the tee being blocked on a send to
//! that very subscriber while the remover waits for the tee to accept the
//! removal. [`Tee::del`] therefore drains the subscriber while it offers the
//! removal request, and keeps doing so until the tee has acted on it.
//!
//! Dropping every input sender closes the tee: all registered subscribers are
//! closed and the registry is emptied.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Receiving end registered with one or more tees.
///
/// Identity is a process-unique id, so adding the same subscriber twice is a
/// no-op. A tee closes the subscribers registered with it when its input
/// closes; `recv` then returns `None`. Removing a subscriber leaves it open,
/// and it can be added again.
pub struct Subscriber<T> {
    id: u64,
    capacity: usize,
    rx: mpsc::Receiver<T>,
    // Strong sender held while no tee holds one, so the channel stays open
    // while nothing is registered.
    tx: Option<mpsc::Sender<T>>,
    weak: mpsc::WeakSender<T>,
}

impl<T> Subscriber<T> {
    /// Create a subscriber whose channel buffers `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let weak = tx.downgrade();
        Self {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            rx,
            tx: Some(tx),
            weak,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next item. `None` once a tee holding it has closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an item if one is already buffered.
    pub fn try_recv(&mut self) -> Result<T, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Sender to hand to a tee. A subscriber closed by a tee gets a fresh
    /// channel; items it had not read are discarded.
    fn sender(&mut self) -> mpsc::Sender<T> {
        if let Some(tx) = self.tx.take().or_else(|| self.weak.upgrade()) {
            return tx;
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        self.rx = rx;
        self.weak = tx.downgrade();
        tx
    }

    /// Hold a sender of our own again. False if the channel is closed.
    fn retain_sender(&mut self) -> bool {
        if self.tx.is_none() {
            self.tx = self.weak.upgrade();
        }
        self.tx.is_some()
    }
}

enum Control<T> {
    Add(u64, mpsc::Sender<T>, oneshot::Sender<()>),
    Del(u64, oneshot::Sender<()>),
    Len(oneshot::Sender<usize>),
}

/// Handle to a running tee worker. Cloning the handle shares the worker.
pub struct Tee<T> {
    control: mpsc::Sender<Control<T>>,
}

impl<T> Clone for Tee<T> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Tee<T> {
    /// Create a tee with its own input channel.
    ///
    /// Returns the tee handle and the input sender. The tee closes once every
    /// clone of the input sender is dropped.
    pub fn new() -> (Self, mpsc::Sender<T>) {
        let (input_tx, input_rx) = mpsc::channel(1);
        (Self::from_receiver(input_rx), input_tx)
    }

    /// Create a tee that reads from an existing channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_receiver(input: mpsc::Receiver<T>) -> Self {
        let (control_tx, control_rx) = mpsc::channel(1);
        tokio::spawn(run(input, control_rx));
        Self {
            control: control_tx,
        }
    }

    /// Register a subscriber for future broadcasts. Adding an already
    /// registered subscriber does nothing.
    pub async fn add(&self, subscriber: &mut Subscriber<T>) {
        let tx = subscriber.sender();
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control.send(Control::Add(subscriber.id, tx, ack_tx)).await.is_err() || ack_rx.await.is_err() {
            debug!("Tee: worker gone, subscriber {} not added", subscriber.id);
        }
    }

    /// Create and register a new subscriber.
    pub async fn subscribe(&self, capacity: usize) -> Subscriber<T> {
        let mut subscriber = Subscriber::new(capacity);
        self.add(&mut subscriber).await;
        subscriber
    }

    /// Deregister a subscriber.
    ///
    /// While the removal request is pending, items the tee is pushing to this
    /// subscriber are discarded so the tee can get back to reading control
    /// requests. Removing a subscriber that was never added is harmless.
    /// The subscriber stays open afterwards.
    pub async fn del(&self, subscriber: &mut Subscriber<T>) {
        let id = subscriber.id;
        if !subscriber.retain_sender() {
            // Closed by its tee: nothing left to remove.
            return;
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        let removal = async {
            if self.control.send(Control::Del(id, ack_tx)).await.is_err() || ack_rx.await.is_err() {
                debug!("Tee: worker gone while removing subscriber {}", id);
            }
        };
        tokio::pin!(removal);

        loop {
            tokio::select! {
                biased;
                () = &mut removal => return,
                item = subscriber.rx.recv() => {
                    if item.is_some() {
                        trace!("Tee: discarded item for departing subscriber {}", id);
                    }
                }
            }
        }
    }

    /// Number of registered subscribers. Zero once the tee has closed.
    pub async fn len(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.control.send(Control::Len(reply_tx)).await.is_err() {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn run<T: Clone>(mut input: mpsc::Receiver<T>, mut control: mpsc::Receiver<Control<T>>) {
    let mut outs: Vec<(u64, mpsc::Sender<T>)> = Vec::new();
    let mut control_open = true;

    loop {
        tokio::select! {
            // Control first, so a subscriber added before an item was sent
            // receives it and one removed before does not.
            biased;
            cmd = control.recv(), if control_open => {
                match cmd {
                    Some(Control::Add(id, tx, ack)) => {
                        if outs.iter().all(|(existing, _)| *existing != id) {
                            outs.push((id, tx));
                        }
                        let _ = ack.send(());
                    }
                    Some(Control::Del(id, ack)) => {
                        outs.retain(|(existing, _)| *existing != id);
                        let _ = ack.send(());
                    }
                    Some(Control::Len(reply)) => {
                        let _ = reply.send(outs.len());
                    }
                    None => control_open = false,
                }
            }
            item = input.recv() => {
                let Some(item) = item else {
                    debug!("Tee: input closed, closing {} subscribers", outs.len());
                    outs.clear();
                    break;
                };

                let mut gone = Vec::new();
                for (id, out) in &outs {
                    if out.send(item.clone()).await.is_err() {
                        gone.push(*id);
                    }
                }
                if !gone.is_empty() {
                    outs.retain(|(id, _)| !gone.contains(id));
                }
            }
        }
    }
}
