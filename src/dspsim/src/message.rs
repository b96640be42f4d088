/// A tuple travelling through a deployed topology, carrying its own timing
/// bookkeeping. Times are in simulation seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    event_time: f64,
    msg_size: usize,
    vertex_id: String,
    accumulated_latency: f64,
    transmission_delay: Option<f64>,
    queuein_time: Option<f64>,
    rcv_time: f64,
}

impl Message {
    pub fn new(event_time: f64, msg_size: usize, vertex_id: &str) -> Self {
        Self::with_latency(event_time, msg_size, vertex_id, 0.0)
    }

    pub fn with_latency(
        event_time: f64,
        msg_size: usize,
        vertex_id: &str,
        accumulated_latency: f64,
    ) -> Self {
        Message {
            event_time,
            msg_size,
            vertex_id: vertex_id.to_owned(),
            accumulated_latency,
            transmission_delay: None,
            queuein_time: None,
            rcv_time: 0.0,
        }
    }

    #[inline]
    pub fn event_time(&self) -> f64 {
        self.event_time
    }

    #[inline]
    pub fn msg_size(&self) -> usize {
        self.msg_size
    }

    /// The vertex that emitted the message.
    #[inline]
    pub fn vertex_id(&self) -> &str {
        &self.vertex_id
    }

    #[inline]
    pub fn accumulated_latency(&self) -> f64 {
        self.accumulated_latency
    }

    #[inline]
    pub fn transmission_delay(&self) -> Option<f64> {
        self.transmission_delay
    }

    #[inline]
    pub fn queuein_time(&self) -> Option<f64> {
        self.queuein_time
    }

    #[inline]
    pub fn rcv_time(&self) -> f64 {
        self.rcv_time
    }

    /// Time from emission to reception.
    pub fn end_to_end_delay(&self) -> f64 {
        self.rcv_time - self.event_time
    }

    pub fn update_transmission_delay(&mut self, delay: f64) {
        if !(delay > 0.0) {
            log::warn!("transmission delay must be positive, got {}", delay);
            return;
        }
        self.transmission_delay = Some(delay);
    }

    /// Add `latency` to the latency accumulated so far.
    pub fn update_accumulated_latency(&mut self, latency: f64) {
        if !(latency > 0.0) {
            log::warn!("latency must be positive, got {}", latency);
            return;
        }
        self.accumulated_latency += latency;
    }

    pub fn update_queuein_time(&mut self, time: f64) {
        self.queuein_time = Some(time);
    }

    pub fn update_receive_time(&mut self, time: f64) {
        self.rcv_time = time;
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}, {}", self.vertex_id, self.event_time, self.rcv_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_updates_are_ignored() {
        let mut msg = Message::new(1.0, 64, "spout");
        msg.update_transmission_delay(0.0);
        msg.update_transmission_delay(-1.0);
        assert_eq!(msg.transmission_delay(), None);
        msg.update_accumulated_latency(0.0);
        assert_eq!(msg.accumulated_latency(), 0.0);

        msg.update_transmission_delay(0.5);
        assert_eq!(msg.transmission_delay(), Some(0.5));
        msg.update_accumulated_latency(0.25);
        msg.update_accumulated_latency(0.25);
        assert_eq!(msg.accumulated_latency(), 0.5);
    }

    #[test]
    fn timing() {
        let mut msg = Message::with_latency(2.0, 128, "split", 0.1);
        assert_eq!(msg.queuein_time(), None);
        msg.update_queuein_time(2.5);
        msg.update_receive_time(3.5);
        assert_eq!(msg.queuein_time(), Some(2.5));
        assert_eq!(msg.end_to_end_delay(), 1.5);
        assert_eq!(msg.to_string(), "split 2, 3.5");
    }
}
