//! Byte-sequence hash functions used to bucket n-grams into bit positions.
//!
//! All functions are pure, process their input left to right and use
//! wrapping 32-bit arithmetic. None of them is cryptographic; they are only
//! required to spread short windows evenly over the bucket space.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::FingerprintError;

/// Named hash function selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    /// Bob Jenkins' one-at-a-time hash.
    #[default]
    Jenkins,
    /// D. J. Bernstein's `h * 33 + b`.
    Djb2,
    /// D. J. Bernstein's `h * 33 ^ b` variant.
    Djb2Xor,
    /// Bret Mulvey's substitution-box hash.
    Sbox,
}

impl HashFunction {
    /// Every selectable function, in a stable order.
    pub const ALL: [HashFunction; 4] = [
        HashFunction::Jenkins,
        HashFunction::Djb2,
        HashFunction::Djb2Xor,
        HashFunction::Sbox,
    ];

    /// Stable name used in configuration files and table tags.
    pub fn name(self) -> &'static str {
        match self {
            HashFunction::Jenkins => "jenkins",
            HashFunction::Djb2 => "djb2",
            HashFunction::Djb2Xor => "djb2xor",
            HashFunction::Sbox => "sbox",
        }
    }

    /// Hash `data` with the selected function.
    #[inline]
    pub fn hash(self, data: &[u8]) -> u32 {
        match self {
            HashFunction::Jenkins => jenkins_one_at_a_time(data),
            HashFunction::Djb2 => djb2(data),
            HashFunction::Djb2Xor => djb2_xor(data),
            HashFunction::Sbox => sbox(data),
        }
    }
}

impl fmt::Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashFunction {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashFunction::ALL
            .into_iter()
            .find(|hf| hf.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FingerprintError::UnknownHashFunction(s.to_string()))
    }
}

/// Jenkins one-at-a-time hash.
///
/// See <https://en.wikipedia.org/wiki/Jenkins_hash_function>.
pub fn jenkins_one_at_a_time(data: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &byte in data {
        hash = hash.wrapping_add(u32::from(byte));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// djb2: `h = h * 33 + b`, seeded with 5381.
pub fn djb2(data: &[u8]) -> u32 {
    data.iter().fold(5381u32, |hash, &byte| {
        hash.wrapping_mul(33).wrapping_add(u32::from(byte))
    })
}

/// djb2 with xor instead of add: `h = h * 33 ^ b`.
pub fn djb2_xor(data: &[u8]) -> u32 {
    data.iter()
        .fold(5381u32, |hash, &byte| hash.wrapping_mul(33) ^ u32::from(byte))
}

/// SBoxHash: `h = (h ^ SBOX[b]) * 3`, seeded with zero.
pub fn sbox(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |hash, &byte| {
        (hash ^ SBOX[usize::from(byte)]).wrapping_mul(3)
    })
}

#[rustfmt::skip]
static SBOX: [u32; 256] = [
    0xF53E_1837, 0x5F14_C86B, 0x9EE3_964C, 0xFA79_6D53,
    0x3222_3FC3, 0x4D82_BC98, 0xA0C7_FA62, 0x63E2_C982,
    0x2499_4A5B, 0x1ECE_7BEE, 0x292B_38EF, 0xD5CD_4E56,
    0x514F_4303, 0x7BE1_2B83, 0x7192_F195, 0x82DC_7300,
    0x0843_80B4, 0x480B_55D3, 0x5F43_0471, 0x13F7_5991,
    0x3F9C_F22C, 0x2FE0_907A, 0xFD8E_1E69, 0x7B1D_5DE8,
    0xD575_A85C, 0xAD01_C50A, 0x7EE0_0737, 0x3CE9_81E8,
    0x0E44_7EFA, 0x2308_9DD6, 0xB59F_149F, 0x1360_0EC7,
    0xE802_C8E6, 0x6709_21E4, 0x7207_EFF0, 0xE747_61B0,
    0x6903_5234, 0xBFA4_0F19, 0xF636_51A0, 0x29E6_4C26,
    0x1F98_CCA7, 0xD957_007E, 0xE71D_DC75, 0x3E72_9595,
    0x7580_B7CC, 0xD7FA_F60B, 0x9248_4323, 0xA441_13EB,
    0xE4CB_DE08, 0x3468_27C9, 0x3CF3_2AFA, 0x0B29_BCF1,
    0x6E29_F7DF, 0xB01E_71CB, 0x3BFB_C0D1, 0x62ED_C5B8,
    0xB7DE_789A, 0xA474_8EC9, 0xE17A_4C4F, 0x67E5_BD03,
    0xF3B3_3D1A, 0x97D8_D3E9, 0x0912_1BC0, 0x347B_2D2C,
    0x79A1_913C, 0x5041_72DE, 0x7F1F_8483, 0x13AC_3CF6,
    0x7A20_94DB, 0xC778_FA12, 0xADF7_469F, 0x2178_6B7B,
    0x71A4_45D0, 0xA889_6C1B, 0x656F_62FB, 0x83A0_59B3,
    0x972D_FE6E, 0x4122_000C, 0x97D9_DA19, 0x17D5_947B,
    0xB1AF_FD0C, 0x6EF8_3B97, 0xAF7F_780B, 0x4613_138A,
    0x7C3E_73A6, 0xCF15_E03D, 0x4157_6322, 0x672D_F292,
    0xB658_588D, 0x33EB_EFA9, 0x938C_BF06, 0x06B6_7381,
    0x07F1_92C6, 0x2BDA_5855, 0x348E_E0E8, 0x19DB_B6E3,
    0x3222_184B, 0xB69D_5DBA, 0x7E76_0B88, 0xAF4D_8154,
    0x007A_51AD, 0x3511_2500, 0xC9CD_2D7D, 0x4F4F_B761,
    0x6947_72E3, 0x694C_8351, 0x4A7E_3AF5, 0x67D6_5CE1,
    0x9287_DE92, 0x2518_DB3C, 0x8CB4_EC06, 0xD154_D38F,
    0xE19A_26BB, 0x295E_E439, 0xC50A_1104, 0x2153_C6A7,
    0x8236_6656, 0x0713_BC2F, 0x6462_215A, 0x21D9_BFCE,
    0xBA8E_ACE6, 0xAE2D_F4C1, 0x2A8D_5E80, 0x3F7E_52D1,
    0x2935_9399, 0xFEA1_D19C, 0x1887_9313, 0x455A_FA81,
    0xFADF_E838, 0x6260_9838, 0xD102_8839, 0x0736_E92F,
    0x3BCA_22A3, 0x1485_B08A, 0x2DA7_900B, 0x852C_156D,
    0xE8F2_4803, 0x0007_8472, 0x13F0_D332, 0x2ACF_D0CF,
    0x5F74_7F5C, 0x87BB_1E2F, 0xA7EF_CB63, 0x23F4_32F0,
    0xE6CE_7C5C, 0x1F95_4EF6, 0xB609_C91B, 0x3B45_71BF,
    0xEED1_7DC0, 0xE556_CDA0, 0xA784_6A8D, 0xFF10_5F94,
    0x52B7_CCDE, 0x0E33_E801, 0x6644_55EA, 0xF2C7_0414,
    0x73E7_B486, 0x8F83_0661, 0x8B59_E826, 0xBB8A_EDCA,
    0xF3D7_0AB9, 0xD739_F2B9, 0x4A04_C34A, 0x88D0_F089,
    0xE021_91A2, 0xD89D_9C78, 0x192C_2749, 0xFC43_A78F,
    0x0AAC_88CB, 0x9438_D42D, 0x9E28_0F7A, 0x3606_3802,
    0x38E8_D018, 0x1C42_A9CB, 0x92AA_FF6C, 0xA248_20C5,
    0x007F_077F, 0xCE5B_C543, 0x6966_8D58, 0x10D6_FF74,
    0xBE00_F621, 0x2130_0BBE, 0x2E9E_8F46, 0x5ACE_A629,
    0xFA1F_86C7, 0x52F2_06B8, 0x3EDF_1A75, 0x6DA8_D843,
    0xCF71_9928, 0x73E3_891F, 0xB4B9_5DD6, 0xB2A4_2D27,
    0xEDA2_0BBF, 0x1A58_DBDF, 0xA449_AD03, 0x6DDE_F22B,
    0x9005_31E6, 0x3D3B_FF35, 0x5B24_ABA2, 0x472B_3E4C,
    0x387F_2D75, 0x4D8D_BA36, 0x71CB_5641, 0xE347_3F3F,
    0xF6CD_4B7F, 0xBF7D_1428, 0x344B_64D0, 0xC5CD_FCB6,
    0xFE2E_0182, 0x2C37_A673, 0xDE4E_B7A3, 0x63FD_C933,
    0x01DC_4063, 0x611F_3571, 0xD167_BFAF, 0x4496_596F,
    0x3DEE_0689, 0xD870_4910, 0x7052_A114, 0x068C_9EC5,
    0x75D0_E766, 0x4D54_CC20, 0xB44E_CDE2, 0x4ABC_653E,
    0x2C55_0A21, 0x1A52_C0DB, 0xCFED_03D0, 0x119B_AFE2,
    0x876A_6133, 0xBC23_2088, 0x435B_A1B2, 0xAE99_BBFA,
    0xBB4F_08E4, 0xA62B_5F49, 0x1DA4_B695, 0x336B_84DE,
    0xDC81_3D31, 0x00C1_34FB, 0x397A_98E6, 0x151F_0E64,
    0xD9EB_3E69, 0xD3C7_DF60, 0xD2F2_C336, 0x2DDD_067B,
    0xBD12_2835, 0xB0B3_BD3A, 0xB0D5_4E46, 0x8641_F1E4,
    0xA0B3_8F96, 0x51D3_9199, 0x37A6_AD75, 0xDF84_EE41,
    0x3C03_4CBA, 0xACDA_62FC, 0x1192_3B8B, 0x45EF_170A,
];
