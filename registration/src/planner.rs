use crate::types::{RegistrationRequest, SegmentName};
use indexmap::IndexSet;

/// Profile tag (`perfis`) to segment label.
pub const PROFILE_SEGMENTS: &[(&str, &str)] = &[
    ("setor-publico", "Setor Público"),
    ("setor-privado", "Setor Privado"),
    ("setor-social", "Setor Social"),
    ("empreendedor", "Empreendedores"),
    ("consultor", "Consultores"),
    ("estudante", "Estudantes"),
    ("jornalista", "Jornalistas"),
    ("pesquisador", "Pesquisadores Acadêmicos"),
];

/// Interest tag (`interesses`) to segment label.
pub const INTEREST_SEGMENTS: &[(&str, &str)] = &[
    ("investimento-social", "Interesse: Investimento Social"),
    ("empreendedorismo", "Interesse: Empreendedorismo"),
    ("inovacao", "Interesse: Inovação"),
    ("saude", "Interesse: Saúde"),
    ("sustentabilidade", "Interesse: Sustentabilidade"),
    ("oportunidades-impacto", "Interesse: Oportunidades de Impacto"),
];

pub const INSTITUTIONAL_SEGMENT: &str = "Informações Institucionais Neurônio";

/// Ordered, duplicate-free list of segments for one registration.
///
/// Order is priority: profiles, then interests, then institutional. The head
/// of the plan is what gets assigned before the response is sent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentationPlan {
    entries: Vec<SegmentName>,
}

impl SegmentationPlan {
    pub fn entries(&self) -> &[SegmentName] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Splits into the first `cap` entries and the remainder.
    pub fn split(mut self, cap: usize) -> (Vec<SegmentName>, Vec<SegmentName>) {
        let rest = self.entries.split_off(cap.min(self.entries.len()));
        (self.entries, rest)
    }
}

impl FromIterator<SegmentName> for SegmentationPlan {
    fn from_iter<I: IntoIterator<Item = SegmentName>>(iter: I) -> Self {
        let unique: IndexSet<SegmentName> = iter.into_iter().collect();
        SegmentationPlan {
            entries: unique.into_iter().collect(),
        }
    }
}

fn label_for(table: &[(&str, &'static str)], tag: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(known, _)| *known == tag)
        .map(|(_, label)| *label)
}

/// Maps a request's selections to segment names. Unknown tags are dropped.
pub fn plan(request: &RegistrationRequest) -> SegmentationPlan {
    let profiles = request
        .profiles
        .iter()
        .filter_map(|tag| label_for(PROFILE_SEGMENTS, tag));
    let interests = request
        .interests
        .iter()
        .filter_map(|tag| label_for(INTEREST_SEGMENTS, tag));
    let institutional = request
        .institutional_info_requested
        .then_some(INSTITUTIONAL_SEGMENT);

    profiles
        .chain(interests)
        .chain(institutional)
        .map(SegmentName::new)
        .collect()
}
