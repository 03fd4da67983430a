use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};

use crate::{
    BankDetail, NewBankDetailCmd, ResultEngine, bank_details,
    util::{normalize_optional_text, normalize_username},
};

use super::{Engine, with_tx};

impl Engine {
    /// Store payment instructions for one currency.
    pub async fn add_bank_detail(&self, cmd: NewBankDetailCmd) -> ResultEngine<BankDetail> {
        let user_id = normalize_username(&cmd.user_id)?;
        let detail = BankDetail::new(
            user_id,
            cmd.currency,
            normalize_optional_text(cmd.bank_name.as_deref()),
            normalize_optional_text(cmd.account_or_phone.as_deref()),
            normalize_optional_text(cmd.recipient_name.as_deref()),
        );
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &detail.user_id).await?;
            bank_details::ActiveModel::from(&detail)
                .insert(&db_tx)
                .await?;
            Ok(detail)
        })
    }

    pub async fn bank_details(&self, user_id: &str) -> ResultEngine<Vec<BankDetail>> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &user_id).await?;
            bank_details::Entity::find()
                .filter(bank_details::Column::UserId.eq(user_id.clone()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(BankDetail::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
