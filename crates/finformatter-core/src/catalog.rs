//! Static catalog of target journals and their formatting rules.

use serde::Serialize;

/// Formatting constraints for one journal, injected into every request.
///
/// Serialized with the field names the system instruction refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalRules {
    pub title_limit: u32,
    pub abstract_limit: u32,
    /// Heading prefixes, outermost level first.
    pub heading_sequence: &'static [&'static str],
    pub font: &'static str,
    pub citation: &'static str,
    pub references_rule: &'static str,
    pub table_fig_rule: &'static str,
    pub math_rule: &'static str,
    pub footnote_rule: &'static str,
    pub other_rule: &'static str,
    #[serde(rename = "useThreeLineTable")]
    pub use_three_line_table: bool,
    #[serde(rename = "variableItalic")]
    pub variable_italic: bool,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Journal {
    pub id: &'static str,
    #[serde(rename = "journal")]
    pub name: &'static str,
    pub rules: JournalRules,
}

impl Journal {
    /// Rules as the JSON object sent to the model.
    pub fn rules_json(&self) -> String {
        serde_json::to_string(&self.rules).unwrap_or_else(|_| "{}".to_string())
    }
}

const CHINESE_HEADINGS: &[&str] = &["一、", "（一）", "1."];
const ROMAN_HEADINGS: &[&str] = &["I.", "A.", "1."];
const DECIMAL_HEADINGS: &[&str] = &["1.", "1.1.", "1.1.1."];

static JOURNALS: [Journal; 7] = [
    Journal {
        id: "erj",
        name: "经济研究 (Economic Research Journal)",
        rules: JournalRules {
            title_limit: 20,
            abstract_limit: 300,
            heading_sequence: CHINESE_HEADINGS,
            font: "SimSun",
            citation: "中国社会科学参考文献规范",
            references_rule: "中文在前英文在后；按作者姓氏拼音排序；需包含DOI（若有）。",
            table_fig_rule: "标准三线表；表名居中在上方，图名居中在下方；数据来源注于图表左下方。",
            math_rule: "变量斜体，常量正体；公式右对齐编号。",
            footnote_rule: "页下脚注，每页重新编号；首页星注包含作者贡献声明。",
            other_rule: "必须提供中英文JEL分类号（至少两个）。",
            use_three_line_table: true,
            variable_italic: true,
        },
    },
    Journal {
        id: "mw",
        name: "管理世界 (Management World)",
        rules: JournalRules {
            title_limit: 25,
            abstract_limit: 400,
            heading_sequence: CHINESE_HEADINGS,
            font: "SimSun",
            citation: "著者-出版年制",
            references_rule: "文中引用为（张三，2023）；末尾参考文献按字母序排列。",
            table_fig_rule: "移除所有纵线；表头底线加粗；支持彩色图表。",
            math_rule: "字母变量斜体；向量与矩阵用粗斜体（Bold Italic）。",
            footnote_rule: "脚注全文连续编号；置于页面底部。",
            other_rule: "摘要需强调政策启示与现实意义。",
            use_three_line_table: true,
            variable_italic: true,
        },
    },
    Journal {
        id: "jfr",
        name: "金融研究 (Journal of Financial Research)",
        rules: JournalRules {
            title_limit: 20,
            abstract_limit: 300,
            heading_sequence: CHINESE_HEADINGS,
            font: "SimSun",
            citation: "GB/T 7714-2015",
            references_rule: "顺序编码制或著者-出版年制均可，需全篇统一。",
            table_fig_rule: "表格需具有自明性；复杂的数学推导建议放附录。",
            math_rule: "希腊字母正体，英文字母变量斜体。",
            footnote_rule: "首页脚注需注明通讯作者及其邮箱。",
            other_rule: "投稿需附带原始数据说明。",
            use_three_line_table: true,
            variable_italic: true,
        },
    },
    Journal {
        id: "ssic",
        name: "中国社会科学 (Social Sciences in China)",
        rules: JournalRules {
            title_limit: 18,
            abstract_limit: 300,
            heading_sequence: CHINESE_HEADINGS,
            font: "SimSun",
            citation: "中社科专属规范",
            references_rule: "注释与参考文献合并，采用页下脚注形式。",
            table_fig_rule: "三线表；尽量避免使用大幅彩色图表。",
            math_rule: "公式需用MathType或LaTeX转化，确保无乱码。",
            footnote_rule: "采用①②③连续编号。",
            other_rule: "政治站位要求高，术语需标准化。",
            use_three_line_table: true,
            variable_italic: true,
        },
    },
    Journal {
        id: "aer",
        name: "American Economic Review (AER)",
        rules: JournalRules {
            title_limit: 15,
            abstract_limit: 100,
            heading_sequence: ROMAN_HEADINGS,
            font: "Times New Roman",
            citation: "Chicago Manual of Style",
            references_rule: "Strict alphabetical order; DOI mandatory.",
            table_fig_rule: "Minimalist; no vertical lines; distinct panel headers (Panel A, Panel B).",
            math_rule: "Variables italicized; matrices bold; equations numbered on right.",
            footnote_rule: "Use sparingly; end-of-page numbering.",
            other_rule: "Strong focus on identification strategy and data transparency.",
            use_three_line_table: true,
            variable_italic: true,
        },
    },
    Journal {
        id: "jf",
        name: "Journal of Finance (JF)",
        rules: JournalRules {
            title_limit: 15,
            abstract_limit: 150,
            heading_sequence: ROMAN_HEADINGS,
            font: "Times New Roman",
            citation: "APA 7th",
            references_rule: "Standard APA format; all URLs must be live.",
            table_fig_rule: "No shading in tables; font size in tables can be 9pt.",
            math_rule: "Bold italic for vectors; distinct subscripts.",
            footnote_rule: "Numeric footnotes; first page contains disclaimer.",
            other_rule: "JEL Classification required.",
            use_three_line_table: true,
            variable_italic: true,
        },
    },
    Journal {
        id: "jpe",
        name: "Journal of Political Economy (JPE)",
        rules: JournalRules {
            title_limit: 12,
            abstract_limit: 100,
            heading_sequence: DECIMAL_HEADINGS,
            font: "Times New Roman",
            citation: "JPE Style",
            references_rule: "Authors' names in small caps in the bibliography.",
            table_fig_rule: "Rigorous labeling; standard black/white format preferred.",
            math_rule: "High precision math typesetting; use LaTeX symbols.",
            footnote_rule: "Substantive footnotes only.",
            other_rule: "Very strict on word count for the entire manuscript.",
            use_three_line_table: true,
            variable_italic: true,
        },
    },
];

/// All catalog entries. The first one is the default.
pub fn journals() -> &'static [Journal] {
    &JOURNALS
}

/// The default journal used when a lookup misses.
pub fn default_journal() -> &'static Journal {
    &JOURNALS[0]
}

/// Exact lookup by identifier (case-insensitive).
pub fn find(id: &str) -> Option<&'static Journal> {
    JOURNALS.iter().find(|j| j.id.eq_ignore_ascii_case(id.trim()))
}

/// Lookup that substitutes the default entry for unknown identifiers.
pub fn resolve(id: &str) -> &'static Journal {
    find(id).unwrap_or_else(|| {
        tracing::debug!(id, fallback = default_journal().id, "unknown journal id");
        default_journal()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = journals().iter().map(|j| j.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), journals().len());
    }

    #[test]
    fn find_is_case_insensitive() {
        assert_eq!(find("AER").map(|j| j.id), Some("aer"));
        assert!(find("nature").is_none());
    }

    #[test]
    fn unknown_id_resolves_to_first_entry() {
        assert_eq!(resolve("nature").id, "erj");
        assert_eq!(resolve("jpe").id, "jpe");
    }

    #[test]
    fn rules_json_uses_wire_names() {
        let json: serde_json::Value = serde_json::from_str(&resolve("jf").rules_json()).unwrap();
        assert_eq!(json["title_limit"], 15);
        assert_eq!(json["useThreeLineTable"], true);
        assert_eq!(json["heading_sequence"][0], "I.");
        assert!(json.get("use_three_line_table").is_none());
    }
}
