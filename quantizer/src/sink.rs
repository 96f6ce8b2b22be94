/// Handler invoked once per fire with the emitted state, or `None` when
/// nothing could be emitted.
pub type EmissionHandler<T> = Box<dyn FnMut(Option<T>) + Send + 'static>;

/// Single-slot publish point for emitted states.
///
/// Delivery is a direct synchronous call; nothing is queued here. Emitting
/// with no handler attached discards the value.
pub struct EmissionSink<T> {
    handler: Option<EmissionHandler<T>>,
}

impl<T> EmissionSink<T> {
    pub fn new() -> Self {
        Self { handler: None }
    }

    /// Attach a handler, replacing any previous one.
    pub fn attach<F>(&mut self, handler: F)
    where
        F: FnMut(Option<T>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Remove the handler. Returns whether one was attached.
    pub fn detach(&mut self) -> bool {
        self.handler.take().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.handler.is_some()
    }

    pub fn emit(&mut self, value: Option<T>) {
        if let Some(handler) = self.handler.as_mut() {
            handler(value);
        }
    }
}

impl<T> Default for EmissionSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EmissionSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmissionSink")
            .field("attached", &self.is_attached())
            .finish()
    }
}
