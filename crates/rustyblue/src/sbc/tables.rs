//! Fixed-point constants for the SBC analysis filterbank and bit
//! allocator, Q15/Q14 format per the A2DP SBC specification tables.

/// 8-subband prototype filter coefficients, 80 taps (10 per subband), Q15.
pub const PROTO_8_80: [i32; 80] = [
    0, 0x83, -2877, 0x1649, -9735, 0x61EC, -36987, 0x1A8B6, -212481, 0xAC911,
    1, -127, 0xB67, -5704, 0x267A, -15248, 0x9F97, -107119, 0x38083, -664312,
    2, -238, 0x5A0, -3217, 0xC9D, -6530, 0x3F27, -29167, 0xDF5D, -203322,
    1, -26, 0x110, -955, -15, -1322, -1722, 0x336, -10336, 0x2C05,
    0, 0, -15, 0x30, -166, 0x15D, -1252, 0x951, -7316, 0x46E6,
    0, 1, -11, 0x2B, -130, 0xD8, -417, 0x3A9, -2481, 0x14F2,
    0, 0, -3, 0xA, -37, 0x2D, -82, 0x69, -147, 0x99,
    0, 0, 0, 1, -4, 6, -7, 9, -3, 3,
];

/// 4-subband prototype filter coefficients, 40 taps (10 per subband), Q15.
pub const PROTO_4_40: [i32; 40] = [
    0, 0x166, -5779, 0x2C95, -19470, 0xC3D9, -73976, 0x35142, -424964, 0x159222,
    2, -253, 0x16B4, -11408, 0x4CD5, -30496, 0x13F4F, -214238, 0x70107, -1328624,
    0, 0, -15, 0x61, -332, 0x2BA, -2504, 0x12A2, -14631, 0x8DCC,
    0, 0, -3, 9, -43, 0x3B, -104, 0x7A, -67, 0x46,
];

/// Cosine modulation matrix for 8-subband analysis, Q14.
pub const COS_TABLE_8: [[i32; 8]; 8] = [
    [0x2D41, 0x2D41, 0x2D41, 0x2D41, 0x2D41, 0x2D41, 0x2D41, 0x2D41],
    [0x3B21, 0x3B21, 0x187E, -0x187E, -0x3B21, -0x3B21, -0x187E, 0x187E],
    [0x3B21, 0x0000, -0x3B21, -0x3B21, 0x0000, 0x3B21, 0x3B21, 0x0000],
    [0x3B21, -0x187E, -0x3B21, 0x187E, 0x3B21, -0x187E, -0x3B21, 0x187E],
    [0x2D41, -0x2D41, -0x2D41, 0x2D41, 0x2D41, -0x2D41, -0x2D41, 0x2D41],
    [0x187E, -0x3B21, 0x187E, 0x187E, -0x3B21, 0x187E, 0x187E, -0x3B21],
    [0x0000, -0x3B21, 0x3B21, 0x0000, -0x3B21, 0x3B21, 0x0000, -0x3B21],
    [-0x187E, -0x187E, 0x3B21, -0x3B21, 0x187E, 0x187E, -0x3B21, 0x3B21],
];

/// Cosine modulation matrix for 4-subband analysis, Q14.
pub const COS_TABLE_4: [[i32; 4]; 4] = [
    [0x2D41, 0x2D41, 0x2D41, 0x2D41],
    [0x3B21, 0x187E, -0x187E, -0x3B21],
    [0x2D41, -0x2D41, -0x2D41, 0x2D41],
    [0x187E, -0x3B21, 0x3B21, -0x187E],
];

/// Loudness psychoacoustic offsets, `[sampling_frequency_index][subband]`, 8 subbands.
pub const LOUDNESS_OFFSET_8: [[i8; 8]; 4] = [
    [-1, 0, 0, 0, 0, 0, 0, 1],
    [-2, 0, 0, 0, 0, 0, 1, 2],
    [-2, 0, 0, 0, 0, 0, 1, 2],
    [-2, 0, 0, 0, 0, 0, 1, 2],
];

/// Loudness psychoacoustic offsets, 4 subbands.
pub const LOUDNESS_OFFSET_4: [[i8; 4]; 4] = [
    [-1, 0, 0, 1],
    [-2, 0, 0, 2],
    [-2, 0, 0, 2],
    [-2, 0, 0, 2],
];

/// `2^(scale_factor + 1)`, used to normalize samples during quantization.
pub const SCALE_FACTOR_LEVELS: [i32; 16] = [
    2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536,
];
