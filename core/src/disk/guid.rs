// Source of unique identifiers for disk and partition GUIDs

use uguid::Guid;

/// Produces statistically unique 128-bit identifiers on demand
pub trait GuidSource {
    fn next_guid(&mut self) -> Guid;
}

impl<F> GuidSource for F
where
    F: FnMut() -> Guid,
{
    fn next_guid(&mut self) -> Guid {
        self()
    }
}

/// Version-4 random GUIDs from the host's entropy source
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomGuids;

#[cfg(feature = "std")]
impl GuidSource for RandomGuids {
    fn next_guid(&mut self) -> Guid {
        Guid::from_bytes(uuid::Uuid::new_v4().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_source() {
        let mut n = 0u8;
        let mut source = || {
            n += 1;
            Guid::from_bytes([n; 16])
        };
        assert_eq!(source.next_guid().to_bytes(), [1u8; 16]);
        assert_eq!(source.next_guid().to_bytes(), [2u8; 16]);
    }
}
