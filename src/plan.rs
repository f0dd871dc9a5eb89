//! Fetch plans: the resolved target and its ordered list of fragments.
//!
//! A plan is built once per session and never changes afterwards. Byte-range
//! plans know every fragment's size upfront; segment plans only learn a
//! segment's size when a resume check probes it.
use crate::error::{FetchError, Result};

/// Default fragment size for byte-range downloads (4 MiB).
pub const DEFAULT_FRAGMENT_SIZE: u64 = 4 * 1024 * 1024;

/// One entry of a media playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub url: String,
    /// Declared duration in seconds, if the playlist carried one.
    pub duration: Option<f64>,
}

impl Segment {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            duration: None,
        }
    }
}

/// The resolved remote resource a session downloads.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchTarget {
    /// A single addressable file fetched in fixed-size byte ranges.
    ByteRange {
        url: String,
        total_size: u64,
        fragment_size: u64,
    },
    /// An ordered list of independently addressable segments.
    SegmentList { segments: Vec<Segment> },
}

impl FetchTarget {
    /// Byte-range target using [`DEFAULT_FRAGMENT_SIZE`].
    pub fn byte_range(url: impl Into<String>, total_size: u64) -> Self {
        Self::ByteRange {
            url: url.into(),
            total_size,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }

    pub fn segment_list(segments: Vec<Segment>) -> Self {
        Self::SegmentList { segments }
    }

    /// Overrides the fragment size of a byte-range target. No-op for segment lists.
    pub fn with_fragment_size(mut self, size: u64) -> Self {
        if let Self::ByteRange { fragment_size, .. } = &mut self {
            *fragment_size = size;
        }
        self
    }

    /// Total size when known before any fetch happens.
    pub fn total_size(&self) -> Option<u64> {
        match self {
            Self::ByteRange { total_size, .. } => Some(*total_size),
            Self::SegmentList { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::ByteRange { url, .. } => Some(url),
            Self::SegmentList { .. } => None,
        }
    }

    /// Builds the ordered fragment list for this target.
    pub fn fragments(&self) -> Result<Vec<Fragment>> {
        match self {
            Self::ByteRange {
                total_size,
                fragment_size,
                ..
            } => plan_byte_ranges(*total_size, *fragment_size),
            Self::SegmentList { segments } => plan_segments(segments),
        }
    }
}

/// Where a fragment's bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentSource {
    /// Inclusive byte range of the target URL.
    Range { start: u64, end: u64 },
    /// A standalone segment URL.
    Segment { url: String },
}

/// One unit of work. `index` defines the position in the final artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub index: usize,
    /// Bytes this fragment must yield; `None` until a segment is probed.
    pub expected_size: Option<u64>,
    pub source: FragmentSource,
}

impl Fragment {
    pub fn is_segment(&self) -> bool {
        matches!(self.source, FragmentSource::Segment { .. })
    }

    /// Value for the `Range` header, for byte-range fragments only.
    pub fn range_header(&self) -> Option<String> {
        match self.source {
            FragmentSource::Range { start, end } => Some(format!("bytes={}-{}", start, end)),
            FragmentSource::Segment { .. } => None,
        }
    }
}

/// Splits `total_size` bytes into fragments of `fragment_size` bytes.
///
/// The last fragment absorbs the remainder, so its length may be smaller than
/// `fragment_size`. Both values must be non-zero.
pub fn plan_byte_ranges(total_size: u64, fragment_size: u64) -> Result<Vec<Fragment>> {
    if total_size == 0 {
        return Err(FetchError::InvalidPlan("total size must be positive".into()));
    }
    if fragment_size == 0 {
        return Err(FetchError::InvalidPlan(
            "fragment size must be positive".into(),
        ));
    }

    let count = total_size.div_ceil(fragment_size);
    let fragments = (0..count)
        .map(|i| {
            let start = i * fragment_size;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                start + fragment_size - 1
            };

            Fragment {
                index: i as usize,
                expected_size: Some(end - start + 1),
                source: FragmentSource::Range { start, end },
            }
        })
        .collect();

    Ok(fragments)
}

/// One fragment per segment, in playlist order.
pub fn plan_segments(segments: &[Segment]) -> Result<Vec<Fragment>> {
    if segments.is_empty() {
        return Err(FetchError::InvalidPlan("segment list is empty".into()));
    }

    Ok(segments
        .iter()
        .enumerate()
        .map(|(index, segment)| Fragment {
            index,
            expected_size: None,
            source: FragmentSource::Segment {
                url: segment.url.clone(),
            },
        })
        .collect())
}

/// Never run with zero workers.
pub fn normalize_workers(requested: usize) -> usize {
    requested.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(f: &Fragment) -> (u64, u64) {
        match f.source {
            FragmentSource::Range { start, end } => (start, end),
            _ => panic!("expected a byte range"),
        }
    }

    #[test]
    fn test_plan_ten_megabytes() {
        let fragments = plan_byte_ranges(10_000_000, 4_194_304).unwrap();
        assert_eq!(fragments.len(), 3);

        let sizes: Vec<u64> = fragments.iter().map(|f| f.expected_size.unwrap()).collect();
        assert_eq!(sizes, vec![4_194_304, 4_194_304, 1_611_392]);

        assert_eq!(bounds(&fragments[0]), (0, 4_194_303));
        assert_eq!(bounds(&fragments[1]), (4_194_304, 8_388_607));
        assert_eq!(bounds(&fragments[2]), (8_388_608, 9_999_999));
        assert_eq!(
            fragments[2].range_header().as_deref(),
            Some("bytes=8388608-9999999")
        );
    }

    #[test]
    fn test_plan_covers_every_byte_once() {
        for (total, frag) in [(1, 1), (1, 7), (100, 3), (100, 25), (4097, 4096), (12, 100)] {
            let fragments = plan_byte_ranges(total, frag).unwrap();
            assert_eq!(fragments.len() as u64, total.div_ceil(frag));

            let mut next = 0;
            for (i, f) in fragments.iter().enumerate() {
                assert_eq!(f.index, i);
                let (start, end) = bounds(f);
                assert_eq!(start, next, "gap or overlap at fragment {}", i);
                assert!(end >= start);
                assert!(end - start + 1 <= frag);
                next = end + 1;
            }
            assert_eq!(next, total);
        }
    }

    #[test]
    fn test_plan_rejects_zero_sizes() {
        assert!(matches!(
            plan_byte_ranges(0, 10),
            Err(FetchError::InvalidPlan(_))
        ));
        assert!(matches!(
            plan_byte_ranges(10, 0),
            Err(FetchError::InvalidPlan(_))
        ));
        assert!(matches!(plan_segments(&[]), Err(FetchError::InvalidPlan(_))));
    }

    #[test]
    fn test_segment_plan_defers_sizes() {
        let target = FetchTarget::segment_list(vec![
            Segment::new("http://a/0.ts"),
            Segment::new("http://a/1.ts"),
        ]);
        let fragments = target.fragments().unwrap();

        assert_eq!(fragments.len(), 2);
        assert!(
            fragments
                .iter()
                .all(|f| f.expected_size.is_none() && f.is_segment())
        );
        assert_eq!(fragments[1].index, 1);
        assert_eq!(fragments[0].range_header(), None);
        assert_eq!(target.total_size(), None);
    }

    #[test]
    fn test_normalize_workers() {
        assert_eq!(normalize_workers(0), 1);
        assert_eq!(normalize_workers(1), 1);
        assert_eq!(normalize_workers(8), 8);
    }
}
