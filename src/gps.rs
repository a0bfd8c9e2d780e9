//! GPS position sources
//!
//! The controller asks its source once per tick. `None` means no usable fix;
//! sources never block.

use crate::nmea::NmeaFix;
use crate::types::GeoPoint;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub trait GpsSource {
    /// Latest usable fix, if any
    fn position(&mut self) -> Option<GeoPoint>;
}

impl GpsSource for Box<dyn GpsSource + Send> {
    fn position(&mut self) -> Option<GeoPoint> {
        (**self).position()
    }
}

/// Constant position, for simulation and bench testing
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedPosition(pub Option<GeoPoint>);

impl GpsSource for FixedPosition {
    fn position(&mut self) -> Option<GeoPoint> {
        self.0
    }
}

/// Ordered list of sources; the first one with a fix wins
#[derive(Default)]
pub struct GpsChain {
    sources: Vec<Box<dyn GpsSource + Send>>,
}

impl GpsChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: GpsSource + Send + 'static>(&mut self, source: S) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl GpsSource for GpsChain {
    fn position(&mut self) -> Option<GeoPoint> {
        for (i, source) in self.sources.iter_mut().enumerate() {
            if let Some(p) = source.position() {
                log::debug!("GPS fix from source #{}", i);
                return Some(p);
            }
        }
        None
    }
}

struct FixTable {
    timeout: Duration,
    fixes: BTreeMap<u32, (GeoPoint, Instant)>,
    /// Source that produced the last returned fix
    current: Option<u32>,
}

impl FixTable {
    fn expire(&mut self, now: Instant) {
        let timeout = self.timeout;
        self.fixes
            .retain(|_, (_, at)| now.saturating_duration_since(*at) <= timeout);
    }
}

/// Latest fix per receiver, written by the NMEA reader and read by the tick.
///
/// Fixes older than the timeout are dropped. Once a receiver has been selected
/// it stays selected while its fix is fresh, so two antennas a few metres apart
/// do not make the measured distance jitter.
#[derive(Clone)]
pub struct SharedFix {
    inner: Arc<Mutex<FixTable>>,
}

impl SharedFix {
    pub fn new(timeout: Duration) -> Self {
        SharedFix {
            inner: Arc::new(Mutex::new(FixTable {
                timeout,
                fixes: BTreeMap::new(),
                current: None,
            })),
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, FixTable> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn update(&self, source: u32, point: GeoPoint) {
        self.update_at(source, point, Instant::now());
    }

    pub fn update_at(&self, source: u32, point: GeoPoint, at: Instant) {
        self.table().fixes.insert(source, (point, at));
    }

    /// Drop the fix of `source` immediately
    pub fn invalidate(&self, source: u32) {
        self.table().fixes.remove(&source);
    }

    /// Apply a parsed sentence from `source`
    pub fn ingest(&self, source: u32, fix: NmeaFix) {
        match fix {
            NmeaFix::Position(point) => self.update(source, point),
            NmeaFix::NoFix => self.invalidate(source),
        }
    }

    pub fn latest_at(&self, now: Instant) -> Option<GeoPoint> {
        let mut table = self.table();
        table.expire(now);

        if let Some(src) = table.current {
            if let Some((point, _)) = table.fixes.get(&src) {
                return Some(*point);
            }
        }

        let (src, (point, _)) = table.fixes.iter().next().map(|(s, f)| (*s, *f))?;
        log::info!("Using GPS source {}", src);
        table.current = Some(src);
        Some(point)
    }
}

impl GpsSource for SharedFix {
    fn position(&mut self) -> Option<GeoPoint> {
        self.latest_at(Instant::now())
    }
}
