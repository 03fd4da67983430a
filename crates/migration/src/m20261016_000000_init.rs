//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for the exchange board:
//!
//! - `users`: invite-tree members and their referral codes
//! - `invitations`: single-use registration codes
//! - `bank_details`: payment instructions per currency
//! - `offers`: posted exchange intents
//! - `requests_for_transaction`: applications to an offer
//! - `transactions`: settlement state, one per offer
//! - `ratings`: post-settlement scores
//! - `transaction_comments`: messages on a transaction
//! - `exchange_rates`: fetched rate snapshots

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    IsRoot,
    ReferralCode,
    InvitedBy,
    InvitesLeft,
    AggregatedRating,
    CreatedAt,
}

#[derive(Iden)]
enum Invitations {
    Table,
    Code,
    Inviter,
    Used,
    InvitedUser,
    CreatedAt,
}

#[derive(Iden)]
enum BankDetails {
    Table,
    Id,
    UserId,
    Currency,
    BankName,
    AccountOrPhone,
    RecipientName,
}

#[derive(Iden)]
enum Offers {
    Table,
    Id,
    Author,
    CurrencyOffered,
    AmountOfferedMinor,
    CurrencyNeeded,
    Status,
    BankDetailId,
    PublishedAt,
}

#[derive(Iden)]
enum RequestsForTransaction {
    Table,
    Id,
    OfferId,
    Applicant,
    Status,
    BankDetailId,
    AppliedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    OfferId,
    AcceptingUser,
    AuthorAssertsTransferDone,
    AcceptingUserConfirmsMoneyReceived,
    AcceptingUserAssertsTransferDone,
    AuthorConfirmsMoneyReceived,
    AuthorEvidence,
    AcceptingUserEvidence,
    Status,
    CreatedAt,
    ClosedAt,
}

#[derive(Iden)]
enum Ratings {
    Table,
    Id,
    TransactionId,
    Author,
    Recipient,
    Score,
    Comment,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TransactionComments {
    Table,
    Id,
    TransactionId,
    Author,
    Content,
    CreatedAt,
}

#[derive(Iden)]
enum ExchangeRates {
    Table,
    Id,
    UsdRub,
    RubMnt,
    UsdMnt,
    UsdRubAlternative,
    FetchedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::IsRoot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::ReferralCode)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::InvitedBy).string())
                    .col(
                        ColumnDef::new(Users::InvitesLeft)
                            .integer()
                            .not_null()
                            .default(3)
                            .check(Expr::col(Users::InvitesLeft).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Users::AggregatedRating)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-users-invited_by")
                            .from(Users::Table, Users::InvitedBy)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-invited_by")
                    .table(Users::Table)
                    .col(Users::InvitedBy)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Invitations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Invitations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invitations::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Invitations::Inviter).string().not_null())
                    .col(
                        ColumnDef::new(Invitations::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Invitations::InvitedUser).string().unique_key())
                    .col(
                        ColumnDef::new(Invitations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invitations-inviter")
                            .from(Invitations::Table, Invitations::Inviter)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invitations-inviter")
                    .table(Invitations::Table)
                    .col(Invitations::Inviter)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Bank details
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BankDetails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BankDetails::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BankDetails::UserId).string().not_null())
                    .col(ColumnDef::new(BankDetails::Currency).string().not_null())
                    .col(ColumnDef::new(BankDetails::BankName).string())
                    .col(ColumnDef::new(BankDetails::AccountOrPhone).string())
                    .col(ColumnDef::new(BankDetails::RecipientName).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bank_details-user_id")
                            .from(BankDetails::Table, BankDetails::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Offers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Offers::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Offers::Author).string().not_null())
                    .col(ColumnDef::new(Offers::CurrencyOffered).string().not_null())
                    .col(
                        ColumnDef::new(Offers::AmountOfferedMinor)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Offers::AmountOfferedMinor).gt(0)),
                    )
                    .col(ColumnDef::new(Offers::CurrencyNeeded).string().not_null())
                    .col(
                        ColumnDef::new(Offers::Status)
                            .string()
                            .not_null()
                            .default("open"),
                    )
                    .col(ColumnDef::new(Offers::BankDetailId).string())
                    .col(
                        ColumnDef::new(Offers::PublishedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-offers-author")
                            .from(Offers::Table, Offers::Author)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-offers-bank_detail_id")
                            .from(Offers::Table, Offers::BankDetailId)
                            .to(BankDetails::Table, BankDetails::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-offers-status-published_at")
                    .table(Offers::Table)
                    .col(Offers::Status)
                    .col(Offers::PublishedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Requests for transaction
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(RequestsForTransaction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RequestsForTransaction::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RequestsForTransaction::OfferId).string().not_null())
                    .col(ColumnDef::new(RequestsForTransaction::Applicant).string().not_null())
                    .col(
                        ColumnDef::new(RequestsForTransaction::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(RequestsForTransaction::BankDetailId).string())
                    .col(
                        ColumnDef::new(RequestsForTransaction::AppliedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-requests-offer_id")
                            .from(RequestsForTransaction::Table, RequestsForTransaction::OfferId)
                            .to(Offers::Table, Offers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-requests-applicant")
                            .from(RequestsForTransaction::Table, RequestsForTransaction::Applicant)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-requests-bank_detail_id")
                            .from(RequestsForTransaction::Table, RequestsForTransaction::BankDetailId)
                            .to(BankDetails::Table, BankDetails::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // One request per applicant and offer, whatever its status.
        manager
            .create_index(
                Index::create()
                    .name("idx-requests-offer_id-applicant")
                    .table(RequestsForTransaction::Table)
                    .col(RequestsForTransaction::OfferId)
                    .col(RequestsForTransaction::Applicant)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::OfferId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AcceptingUser)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::AuthorAssertsTransferDone)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::AcceptingUserConfirmsMoneyReceived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::AcceptingUserAssertsTransferDone)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::AuthorConfirmsMoneyReceived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Transactions::AuthorEvidence).string())
                    .col(ColumnDef::new(Transactions::AcceptingUserEvidence).string())
                    .col(
                        ColumnDef::new(Transactions::Status)
                            .string()
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::ClosedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-offer_id")
                            .from(Transactions::Table, Transactions::OfferId)
                            .to(Offers::Table, Offers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-accepting_user")
                            .from(Transactions::Table, Transactions::AcceptingUser)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Get-or-create on accept relies on this index.
        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-offer_id")
                    .table(Transactions::Table)
                    .col(Transactions::OfferId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Ratings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Ratings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Ratings::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Ratings::TransactionId).string().not_null())
                    .col(ColumnDef::new(Ratings::Author).string().not_null())
                    .col(ColumnDef::new(Ratings::Recipient).string().not_null())
                    .col(
                        ColumnDef::new(Ratings::Score)
                            .integer()
                            .not_null()
                            .check(Expr::col(Ratings::Score).between(1, 5)),
                    )
                    .col(ColumnDef::new(Ratings::Comment).text())
                    .col(
                        ColumnDef::new(Ratings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Ratings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ratings-transaction_id")
                            .from(Ratings::Table, Ratings::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ratings-author")
                            .from(Ratings::Table, Ratings::Author)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ratings-recipient")
                            .from(Ratings::Table, Ratings::Recipient)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Target of the rating upsert.
        manager
            .create_index(
                Index::create()
                    .name("idx-ratings-transaction_id-author-recipient")
                    .table(Ratings::Table)
                    .col(Ratings::TransactionId)
                    .col(Ratings::Author)
                    .col(Ratings::Recipient)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ratings-recipient")
                    .table(Ratings::Table)
                    .col(Ratings::Recipient)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Transaction comments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(TransactionComments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionComments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransactionComments::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionComments::Author)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionComments::Content)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionComments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transaction_comments-transaction_id")
                            .from(
                                TransactionComments::Table,
                                TransactionComments::TransactionId,
                            )
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transaction_comments-author")
                            .from(TransactionComments::Table, TransactionComments::Author)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transaction_comments-transaction_id")
                    .table(TransactionComments::Table)
                    .col(TransactionComments::TransactionId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Exchange rates
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExchangeRates::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExchangeRates::UsdRub).double().not_null())
                    .col(ColumnDef::new(ExchangeRates::RubMnt).double().not_null())
                    .col(ColumnDef::new(ExchangeRates::UsdMnt).double().not_null())
                    .col(ColumnDef::new(ExchangeRates::UsdRubAlternative).double())
                    .col(
                        ColumnDef::new(ExchangeRates::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-exchange_rates-fetched_at")
                    .table(ExchangeRates::Table)
                    .col(ExchangeRates::FetchedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TransactionComments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Ratings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RequestsForTransaction::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankDetails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invitations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
