use crate::models::exercise::ExerciseType;

/// 筛选条件（临时状态，不持久化）
///
/// 每个字段为 `None` 时匹配全部
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub oa: Option<String>,
    pub indicator: Option<String>,
    pub exercise_type: Option<ExerciseType>,
    pub keyword: Option<String>,
}

impl FilterState {
    pub fn new(subject: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            grade: Some(grade.into()),
            ..Default::default()
        }
    }

    /// 科目/年级变化后，如果当前 OA 不在可选范围内则清空
    pub fn normalize_oa(&mut self, available: &[String]) {
        if let Some(oa) = &self.oa {
            if !available.iter().any(|candidate| candidate == oa) {
                self.oa = None;
            }
        }
    }
}

/// 把空白字符串视为未设置
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
