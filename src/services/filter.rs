//! 题目筛选 - 业务能力层
//!
//! 每次筛选条件或题库变化时整体重新计算，不做增量维护

use std::collections::BTreeSet;

use crate::models::exercise::Exercise;
use crate::models::filter::{non_empty, FilterState};

/// 按筛选条件过滤题目，保持输入顺序
///
/// 所有条件取交集；未设置的条件匹配全部。关键字不区分大小写，
/// 同时匹配正文和文件名。
pub fn apply<'a, I>(filters: &FilterState, exercises: I) -> Vec<&'a Exercise>
where
    I: IntoIterator<Item = &'a Exercise>,
{
    let keyword = non_empty(&filters.keyword).map(str::to_lowercase);

    exercises
        .into_iter()
        .filter(|ex| matches(filters, keyword.as_deref(), ex))
        .collect()
}

fn matches(filters: &FilterState, keyword: Option<&str>, ex: &Exercise) -> bool {
    let match_subject = non_empty(&filters.subject).map_or(true, |s| ex.subject == s);
    let match_grade = non_empty(&filters.grade).map_or(true, |g| ex.grade == g);
    let match_oa = non_empty(&filters.oa).map_or(true, |oa| ex.oa == oa);
    let match_indicator = non_empty(&filters.indicator).map_or(true, |i| ex.indicator == i);
    let match_type = filters.exercise_type.map_or(true, |t| ex.exercise_type == t);
    let match_keyword = keyword.map_or(true, |kw| {
        ex.content.to_lowercase().contains(kw) || ex.filename.to_lowercase().contains(kw)
    });

    match_subject && match_grade && match_oa && match_indicator && match_type && match_keyword
}

/// 当前科目+年级下可选的 OA（去重、排序）
pub fn available_oas<'a, I>(subject: &str, grade: &str, exercises: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Exercise>,
{
    exercises
        .into_iter()
        .filter(|ex| ex.subject == subject && ex.grade == grade)
        .map(|ex| ex.oa.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 重新计算可选 OA，并在当前 OA 失效时清空它
pub fn refresh_oa<'a, I>(filters: &mut FilterState, exercises: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Exercise>,
{
    let subject = filters.subject.clone().unwrap_or_default();
    let grade = filters.grade.clone().unwrap_or_default();
    let available = available_oas(&subject, &grade, exercises);
    filters.normalize_oa(&available);
    available
}
