//! A burst accumulator. Modeled on `PacketGroup` in
//! `interceptor/twcc/estimator/delay_based/packet_group.rs`, but tracks
//! first/last timestamps (rather than earliest/latest-by-value) to match
//! §3's "first/last sender timestamp" / "first/last arrival instant"
//! data model and the §4.2 accept predicate.

use crate::time::SendTime;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct PacketGroup {
    pub first_send_time: SendTime,
    pub last_send_time: SendTime,
    pub first_arrival: Instant,
    pub last_arrival: Instant,
    pub size_bytes: u64,
    pub num_packets: u64,
}

impl PacketGroup {
    pub fn new(send_time: SendTime, arrival: Instant, size: u64) -> PacketGroup {
        PacketGroup {
            first_send_time: send_time,
            last_send_time: send_time,
            first_arrival: arrival,
            last_arrival: arrival,
            size_bytes: size,
            num_packets: 1,
        }
    }

    pub fn add_packet(&mut self, send_time: SendTime, arrival: Instant, size: u64) {
        self.size_bytes += size;
        self.num_packets += 1;
        if send_time > self.last_send_time {
            self.last_send_time = send_time;
        }
        if arrival > self.last_arrival {
            self.last_arrival = arrival;
        }
    }
}
