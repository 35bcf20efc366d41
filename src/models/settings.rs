use serde::{Deserialize, Serialize};

/// 全局设置（单例）
///
/// 独立于题库持久化，只能通过 [`GlobalSettings::apply`] 修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// 学校名称，出现在导出文档页眉
    #[serde(default)]
    pub institution_name: String,
    /// 校徽（data URL）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// 教师版是否附带规格表
    #[serde(default = "default_true")]
    pub include_spec_table: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            institution_name: String::new(),
            logo: None,
            include_spec_table: true,
        }
    }
}

impl GlobalSettings {
    /// 是否需要输出页眉
    pub fn has_header(&self) -> bool {
        self.logo.is_some() || !self.institution_name.trim().is_empty()
    }

    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(name) = patch.institution_name {
            self.institution_name = name;
        }
        if let Some(logo) = patch.logo {
            self.logo = logo;
        }
        if let Some(flag) = patch.include_spec_table {
            self.include_spec_table = flag;
        }
    }
}

/// 设置的部分更新
///
/// `logo: Some(None)` 表示清除校徽
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub institution_name: Option<String>,
    pub logo: Option<Option<String>>,
    pub include_spec_table: Option<bool>,
}
