//! Frozen historical enum tables for serialized model schemas.
//!
//! Old NN models encode categorical fields with the integer codes that were
//! current when the model was trained. Those codes are not stable across
//! schema generations, so each generation keeps its own name/value table
//! here, never to be edited again. Conversion from a modern value goes
//! through the canonical *name*: if the name did not exist in the old
//! schema, the conversion fails and the workload cannot be encoded for that
//! model.

/// A frozen name/value table.
pub type Table = &'static [(&'static str, u32)];

/// Look a name up in a frozen table.
pub fn code(table: Table, name: &str) -> Option<u32> {
    table.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

/// Name for a code in a frozen table.
pub fn name(table: Table, value: u32) -> Option<&'static str> {
    table.iter().find(|(_, v)| *v == value).map(|(n, _)| *n)
}

/// Cardinality of a frozen table (the `__size` sentinel of the original
/// enum).
pub fn cardinality(table: Table) -> usize {
    table.len()
}

/// Earliest serialized schema. Pre-dates the 4.0 device, channel-major
/// convolution, the layout permutations and the cuboid execution modes.
pub mod v01 {
    use super::Table;

    pub const DEVICE: Table = &[("VPU_2_0", 0), ("VPU_2_7", 1)];

    pub const OPERATION: Table = &[
        ("CONVOLUTION", 0),
        ("DW_CONVOLUTION", 1),
        ("ELTWISE", 2),
        ("MAXPOOL", 3),
        ("AVEPOOL", 4),
    ];

    pub const DATATYPE: Table = &[
        ("UINT8", 0),
        ("INT8", 1),
        ("FLOAT16", 2),
        ("BFLOAT16", 3),
    ];

    pub const EXECUTION_MODE: Table = &[
        ("VECTOR", 0),
        ("MATRIX", 1),
        ("VECTOR_FP16", 2),
    ];

    pub const ACTIVATION: Table = &[
        ("NONE", 0),
        ("RELU", 1),
        ("LRELU", 2),
        ("ADD", 3),
        ("SUB", 4),
        ("MULT", 5),
    ];

    pub const LAYOUT: Table = &[("ZMAJOR", 0), ("CMAJOR", 1)];
}

/// Schema introduced together with inter-tile awareness: adds the 4.0
/// device, CM convolution, permutation layouts, cuboid execution modes,
/// swizzling keys and ISI strategies.
pub mod v11 {
    use super::Table;

    pub const DEVICE: Table = &[("VPU_2_0", 0), ("VPU_2_7", 1), ("VPU_4_0", 2)];

    pub const OPERATION: Table = &[
        ("CONVOLUTION", 0),
        ("DW_CONVOLUTION", 1),
        ("CM_CONVOLUTION", 2),
        ("ELTWISE", 3),
        ("MAXPOOL", 4),
        ("AVEPOOL", 5),
    ];

    pub const DATATYPE: Table = &[
        ("UINT8", 0),
        ("INT8", 1),
        ("FLOAT16", 2),
        ("BFLOAT16", 3),
    ];

    pub const EXECUTION_MODE: Table = &[
        ("VECTOR", 0),
        ("MATRIX", 1),
        ("VECTOR_FP16", 2),
        ("CUBOID_16x16", 3),
        ("CUBOID_8x16", 4),
        ("CUBOID_4x16", 5),
    ];

    pub const ACTIVATION: Table = &[
        ("NONE", 0),
        ("RELU", 1),
        ("LRELU", 2),
        ("ADD", 3),
        ("SUB", 4),
        ("MULT", 5),
    ];

    pub const LAYOUT: Table = &[
        ("ZMAJOR", 0),
        ("CMAJOR", 1),
        ("ZXY", 2),
        ("XZY", 3),
        ("YXZ", 4),
        ("YZX", 5),
        ("ZYX", 6),
        ("XYZ", 7),
    ];

    pub const SWIZZLING: Table = &[
        ("KEY_0", 0),
        ("KEY_1", 1),
        ("KEY_2", 2),
        ("KEY_3", 3),
        ("KEY_4", 4),
        ("KEY_5", 5),
    ];

    pub const ISI_STRATEGY: Table = &[
        ("CLUSTERING", 0),
        ("SPLIT_OVER_H", 1),
        ("SPLIT_OVER_K", 2),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_back() {
        assert_eq!(code(v01::DEVICE, "VPU_2_7"), Some(1));
        assert_eq!(name(v01::DEVICE, 1), Some("VPU_2_7"));
        assert_eq!(code(v01::DEVICE, "VPU_4_0"), None);
        assert_eq!(code(v11::DEVICE, "VPU_4_0"), Some(2));
    }

    #[test]
    fn v01_omits_later_additions() {
        assert_eq!(code(v01::OPERATION, "CM_CONVOLUTION"), None);
        assert_eq!(code(v11::OPERATION, "CM_CONVOLUTION"), Some(2));
        assert_eq!(code(v01::LAYOUT, "ZXY"), None);
        assert_eq!(code(v11::LAYOUT, "ZXY"), Some(2));
    }

    #[test]
    fn codes_differ_across_generations() {
        // The same name may carry a different numeric code per generation;
        // conversion must therefore never go through numbers.
        assert_eq!(code(v01::OPERATION, "ELTWISE"), Some(2));
        assert_eq!(code(v11::OPERATION, "ELTWISE"), Some(3));
    }

    #[test]
    fn cardinalities() {
        assert_eq!(cardinality(v01::DEVICE), 2);
        assert_eq!(cardinality(v11::DEVICE), 3);
        assert_eq!(cardinality(v01::EXECUTION_MODE), 3);
        assert_eq!(cardinality(v11::EXECUTION_MODE), 6);
    }
}
