// src/common/i18n.rs

use std::collections::HashMap;

pub const DEFAULT_LANGUAGE: &str = "pt";

// Catálogo de mensagens por idioma, indexado pelo `AppError::code()`.
// Os textos usam marcadores `{nome}` preenchidos com os parâmetros do erro.
#[derive(Debug, Clone)]
pub struct I18nStore {
    catalogs: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

const PT: &[(&str, &str)] = &[
    ("validation", "Um ou mais campos são inválidos."),
    ("not_found", "{resource} não encontrado(a)."),
    ("price_not_defined", "Preço não definido para o artigo {procedure} e entidade {entity}."),
    ("budget_not_draft", "Só é possível editar orçamentos em rascunho."),
    ("budget_has_items", "Não é possível alterar a entidade de um orçamento que já possui itens."),
    ("empty_budget_approval", "Não é possível aprovar orçamento sem itens."),
    ("tooth_required", "Número de dente é obrigatório para este artigo."),
    ("faces_required", "Deve indicar pelo menos uma face do dente."),
    ("invalid_faces", "Faces inválidas: {faces}"),
    ("invoice_origin_mismatch", "Origem da fatura inválida: {reason}"),
    ("item_origin_mismatch", "O tipo de origem do item não corresponde ao tipo da fatura."),
    ("invoice_not_plan", "Só faturas de plano podem ter parcelas."),
    ("installments_already_defined", "Parcelas já foram definidas para esta fatura."),
    ("installment_sum_mismatch", "Soma das parcelas ({actual}) não coincide com total da fatura ({expected})."),
    ("invalid_installment_amount", "A parcela {number} deve ser positiva e ter no máximo duas casas decimais ({amount})."),
    ("invoice_has_installments", "Esta fatura tem parcelas definidas. Faça o pagamento através de uma parcela."),
    ("invoice_has_payments", "Esta fatura já possui pagamentos registados."),
    ("invoice_cancelled", "Não é possível operar sobre uma fatura cancelada."),
    ("invoice_already_paid", "Esta fatura já está totalmente paga."),
    ("session_not_open", "Sessão de caixa inválida ou fechada."),
    ("session_already_open", "Já existe uma sessão de caixa aberta."),
    ("payment_target_ambiguous", "Deve indicar exatamente um de fatura ou parcela."),
    ("plan_item_closed", "Este procedimento já está {status} e não pode ser alterado."),
    ("consultation_not_active", "A consulta está {status} e não permite adicionar procedimentos."),
    ("consultation_completed", "Não é possível remover itens de uma consulta concluída."),
    ("patient_mismatch", "{resource} pertence a outro paciente."),
    ("duplicate", "Registo duplicado: {resource}"),
    ("invalid_token", "Token de autenticação inválido ou ausente."),
    ("tenant_mismatch", "O cabeçalho X-Tenant-ID não corresponde à clínica do utilizador."),
    ("forbidden", "Acesso restrito ao perfil {role}."),
    ("payment_failed", "Erro ao registar pagamento."),
    ("internal", "Ocorreu um erro inesperado."),
];

const EN: &[(&str, &str)] = &[
    ("validation", "One or more fields are invalid."),
    ("not_found", "{resource} not found."),
    ("price_not_defined", "No price defined for procedure {procedure} and entity {entity}."),
    ("budget_not_draft", "Only draft budgets can be edited."),
    ("budget_has_items", "Cannot change the entity of a budget that already has items."),
    ("empty_budget_approval", "Cannot approve a budget without items."),
    ("tooth_required", "A tooth number is required for this procedure."),
    ("faces_required", "At least one tooth face must be given."),
    ("invalid_faces", "Invalid faces: {faces}"),
    ("invoice_origin_mismatch", "Invalid invoice origin: {reason}"),
    ("item_origin_mismatch", "Item origin does not match the invoice type."),
    ("invoice_not_plan", "Only plan invoices can have installments."),
    ("installments_already_defined", "Installments were already defined for this invoice."),
    ("installment_sum_mismatch", "Installments sum ({actual}) does not match the invoice total ({expected})."),
    ("invalid_installment_amount", "Installment {number} must be positive with at most two decimal places ({amount})."),
    ("invoice_has_installments", "This invoice has installments. Pay through a specific installment."),
    ("invoice_has_payments", "This invoice already has payments."),
    ("invoice_cancelled", "Cannot operate on a cancelled invoice."),
    ("invoice_already_paid", "This invoice is already fully paid."),
    ("session_not_open", "Cash register session is invalid or closed."),
    ("session_already_open", "A cash register session is already open."),
    ("payment_target_ambiguous", "Exactly one of invoice or installment must be given."),
    ("plan_item_closed", "This procedure is already {status} and cannot be changed."),
    ("consultation_not_active", "The consultation is {status} and does not accept procedures."),
    ("consultation_completed", "Cannot remove items from a completed consultation."),
    ("patient_mismatch", "{resource} belongs to another patient."),
    ("duplicate", "Duplicate record: {resource}"),
    ("invalid_token", "Invalid or missing authentication token."),
    ("tenant_mismatch", "The X-Tenant-ID header does not match the user's clinic."),
    ("forbidden", "Access restricted to the {role} role."),
    ("payment_failed", "Failed to register payment."),
    ("internal", "An unexpected error occurred."),
];

impl Default for I18nStore {
    fn default() -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert("pt", PT.iter().copied().collect());
        catalogs.insert("en", EN.iter().copied().collect());
        Self { catalogs }
    }
}

impl I18nStore {
    /// Traduz `code` para `lang`, caindo para o idioma padrão quando o idioma não existe.
    pub fn translate(&self, lang: &str, code: &str, params: &[(&str, String)]) -> Option<String> {
        let catalog = self
            .catalogs
            .get(lang)
            .or_else(|| self.catalogs.get(DEFAULT_LANGUAGE))?;

        let template = catalog.get(code)?;
        let mut message = template.to_string();
        for (name, value) in params {
            message = message.replace(&format!("{{{}}}", name), value);
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_portuguese() {
        let store = I18nStore::default();
        let msg = store.translate("de", "session_already_open", &[]).unwrap();
        assert_eq!(msg, "Já existe uma sessão de caixa aberta.");
    }

    #[test]
    fn placeholders_are_filled() {
        let store = I18nStore::default();
        let msg = store
            .translate("en", "invalid_faces", &[("faces", "X, Z".to_string())])
            .unwrap();
        assert_eq!(msg, "Invalid faces: X, Z");
    }

    #[test]
    fn catalogs_cover_the_same_codes() {
        let pt: Vec<_> = PT.iter().map(|(k, _)| *k).collect();
        let en: Vec<_> = EN.iter().map(|(k, _)| *k).collect();
        assert_eq!(pt, en);
    }
}
