//! 预设的科目与年级
//!
//! 题库为空时也用它们来填充筛选器和上传表单

/// 科目
pub const SUBJECTS: [&str; 10] = [
    "Matemáticas",
    "Lenguaje",
    "Historia",
    "Ciencias Naturales",
    "Química",
    "Física",
    "Biología",
    "Inglés",
    "Tecnología",
    "Artes",
];

/// 年级
pub const GRADES: [&str; 12] = [
    "1° Básico",
    "2° Básico",
    "3° Básico",
    "4° Básico",
    "5° Básico",
    "6° Básico",
    "7° Básico",
    "8° Básico",
    "I Medio",
    "II Medio",
    "III Medio",
    "IV Medio",
];

/// 去掉重音并转小写，用于宽松比较
fn fold(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' => 'u',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// 智能查找科目（先精确，再忽略大小写和重音，最后前缀匹配）
pub fn find_subject(s: &str) -> Option<&'static str> {
    if let Some(exact) = SUBJECTS.iter().find(|subject| **subject == s) {
        return Some(exact);
    }

    let wanted = fold(s);
    if wanted.is_empty() {
        return None;
    }
    SUBJECTS
        .iter()
        .find(|subject| fold(subject) == wanted)
        .or_else(|| SUBJECTS.iter().find(|subject| fold(subject).starts_with(&wanted)))
        .copied()
}

/// 查找年级，支持 "1", "1b", "I Medio" 等写法
pub fn find_grade(s: &str) -> Option<&'static str> {
    if let Some(exact) = GRADES.iter().find(|grade| **grade == s) {
        return Some(exact);
    }

    let wanted = fold(s).replace(['°', 'º'], "");
    let wanted = wanted.split_whitespace().collect::<Vec<_>>().join(" ");
    GRADES
        .iter()
        .find(|grade| {
            let folded = fold(grade).replace('°', "");
            let folded = folded.split_whitespace().collect::<Vec<_>>().join(" ");
            folded == wanted
                || folded.replace(" basico", "") == wanted
                || folded.replace(" basico", "b") == wanted
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_subject() {
        assert_eq!(find_subject("Matemáticas"), Some("Matemáticas"));
        assert_eq!(find_subject("matematicas"), Some("Matemáticas"));
        assert_eq!(find_subject("QUÍMICA"), Some("Química"));
        assert_eq!(find_subject("bio"), Some("Biología"));
        assert_eq!(find_subject("Astronomía"), None);
        assert_eq!(find_subject(""), None);
    }

    #[test]
    fn test_find_grade() {
        assert_eq!(find_grade("1° Básico"), Some("1° Básico"));
        assert_eq!(find_grade("7 basico"), Some("7° Básico"));
        assert_eq!(find_grade("7"), Some("7° Básico"));
        assert_eq!(find_grade("3b"), Some("3° Básico"));
        assert_eq!(find_grade("ii medio"), Some("II Medio"));
        assert_eq!(find_grade("V Medio"), None);
    }
}
