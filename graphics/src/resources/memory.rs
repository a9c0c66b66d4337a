//! Alignment and memory type selection.

use ash::vk;

use crate::error::GraphicsError;

/// Round `value` up to the next multiple of `alignment`, a power of two.
///
/// Zero stays zero.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    if value == 0 {
        0
    } else {
        (value + alignment - 1) & !(alignment - 1)
    }
}

/// Index of the first memory type allowed by `type_filter` whose property
/// flags contain all of `required`.
///
/// There is no fallback: when no type qualifies the result is
/// [`GraphicsError::FeatureNotSupported`].
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32, GraphicsError> {
    let count = (memory_properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);

    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_filter & (1 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
        .ok_or_else(|| {
            GraphicsError::FeatureNotSupported(format!(
                "memory type with {:?} (filter {:#b})",
                required, type_filter
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        properties
    }

    #[rstest]
    fn aligned_values_are_multiples(
        #[values(1, 4, 16, 64, 256)] alignment: u64,
        #[values(0, 1, 63, 64, 65, 80, 1000)] value: u64,
    ) {
        let aligned = align_up(value, alignment);
        assert_eq!(aligned % alignment, 0);
        assert!(aligned >= value);
        assert!(aligned - value < alignment);
    }

    #[rstest]
    #[case(0, 256, 0)]
    #[case(1, 256, 256)]
    #[case(80, 64, 128)]
    #[case(128, 64, 128)]
    #[case(80, 256, 256)]
    fn align_up_cases(#[case] value: u64, #[case] alignment: u64, #[case] expected: u64) {
        assert_eq!(align_up(value, alignment), expected);
    }

    #[test]
    fn picks_first_type_in_filter_with_required_flags() {
        let properties = properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL
                | vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&properties, 0b111, host).unwrap(), 1);
        // Type 1 is filtered out, so the shared type wins.
        assert_eq!(find_memory_type(&properties, 0b101, host).unwrap(), 2);

        let index = find_memory_type(&properties, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn selected_type_satisfies_filter_and_flags() {
        let properties = properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::LAZILY_ALLOCATED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        for filter in 1u32..8 {
            if let Ok(index) =
                find_memory_type(&properties, filter, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            {
                assert_ne!(filter & (1 << index), 0);
                assert!(properties.memory_types[index as usize]
                    .property_flags
                    .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));
            }
        }
    }

    #[test]
    fn missing_type_is_not_supported() {
        let properties = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let err = find_memory_type(&properties, u32::MAX, vk::MemoryPropertyFlags::HOST_VISIBLE)
            .unwrap_err();
        assert!(matches!(err, GraphicsError::FeatureNotSupported(_)));
    }

    #[test]
    fn types_beyond_count_are_ignored() {
        let mut properties = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;

        assert!(
            find_memory_type(&properties, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE).is_err()
        );
    }
}
