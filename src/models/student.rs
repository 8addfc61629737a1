use serde::{Deserialize, Serialize};

/// 考生身份信息，开始考试前填写，考试中不可修改
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentData {
    pub name: String,
    pub class: String,
    pub nisn: String,
}

impl StudentData {
    pub fn new(name: impl Into<String>, class: impl Into<String>, nisn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            nisn: nisn.into(),
        }
    }

    /// 三项是否都已填写（去掉首尾空白后非空）
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.class, &self.nisn]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}
