use tokio::sync::watch;

/// What the wallet side hands over once it is connected: the active chain
/// and a client able to read logs on it.
#[derive(Clone, Debug)]
pub struct Session<C> {
    pub chain_id: u64,
    pub client: C,
}

#[derive(Debug)]
pub struct SessionPublisher<C> {
    tx: watch::Sender<Option<Session<C>>>,
}

impl<C> SessionPublisher<C> {
    pub fn connect(&self, session: Session<C>) {
        self.tx.send_replace(Some(session));
    }

    pub fn disconnect(&self) {
        self.tx.send_replace(None);
    }
}

/// Read side of the session. Empty until the wallet layer connects.
#[derive(Clone, Debug)]
pub struct SessionSlot<C> {
    rx: watch::Receiver<Option<Session<C>>>,
}

impl<C: Clone> SessionSlot<C> {
    pub fn current(&self) -> Option<Session<C>> {
        self.rx.borrow().clone()
    }
}

pub fn channel<C>() -> (SessionPublisher<C>, SessionSlot<C>) {
    let (tx, rx) = watch::channel(None);
    (SessionPublisher { tx }, SessionSlot { rx })
}
