use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Plain token-bucket rate limiter, one per provider client, parameterised
/// entirely from `GeocoderConfig` ("sourced from one
/// configuration surface, not hard-coded per call-site").
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            capacity: requests_per_second.max(1.0),
            refill_per_sec: requests_per_second.max(1.0),
            state: Mutex::new((requests_per_second.max(1.0), Instant::now())),
        }
    }

    /// Blocks (via sleep) until a token is available, then consumes one.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().expect("rate limiter mutex poisoned");
                let (tokens, last) = &mut *state;
                let elapsed = last.elapsed().as_secs_f64();
                *tokens = (*tokens + elapsed * self.refill_per_sec).min(self.capacity);
                *last = Instant::now();

                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64((1.0 - *tokens) / self.refill_per_sec))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_immediately_within_capacity() {
        let limiter = RateLimiter::new(5.0);
        for _ in 0..5 {
            limiter.acquire().await;
        }
    }
}
