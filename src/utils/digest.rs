use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// 计算内容摘要，用于判断节点内容是否变化
///
/// 字符串直接参与哈希，其他值先序列化为 JSON。
pub fn create_content_digest<T: Serialize + ?Sized>(input: &T) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_value(input) {
        Ok(serde_json::Value::String(s)) => hasher.update(s.as_bytes()),
        Ok(other) => hasher.update(other.to_string().as_bytes()),
        Err(_) => {}
    }
    format!("{:x}", hasher.finalize())
}

/// 对多段原始字节计算摘要
pub fn digest_bytes(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

/// 派生各命名空间 UUID 的固定种子
const NODE_ID_SEED: Uuid = Uuid::from_u128(0x638f7a53_c567_4eca_8fc1_b23efb1cfb2b);

/// 从种子生成确定性的节点 ID（UUID v5）
///
/// 命名空间先映射为一个 UUID，再以它为命名空间对 `seed` 做 v5 哈希。
/// 同一 `namespace` 与 `seed` 始终得到相同的 ID。
pub fn create_node_id(seed: &str, namespace: &str) -> String {
    let namespace = Uuid::new_v5(&NODE_ID_SEED, namespace.as_bytes());
    Uuid::new_v5(&namespace, seed.as_bytes()).to_string()
}
