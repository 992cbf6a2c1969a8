use crate::{ChainError, Pubkey, Result};

/// Seed prefix of a vault deposit account.
pub const VAULT_DEPOSIT_SEED: &[u8] = b"vault_deposit";

/// Address of the account the vault program creates for a paid deposit.
pub fn deposit_address(program_id: &Pubkey, vault: &Pubkey, deposit_id: &[u8; 32]) -> Result<Pubkey> {
    let (address, _) = Pubkey::try_find_program_address(
        &[VAULT_DEPOSIT_SEED, vault.as_ref(), deposit_id.as_slice()],
        program_id,
    )
    .ok_or(ChainError::NoProgramAddress)?;
    Ok(address)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn program() -> Pubkey {
        Pubkey::from_str("DkGdbW8SJmUoVE9KaBRwrvsQVhcuidy47DimjrhSoySE").unwrap()
    }

    #[test]
    fn deposit_addresses_are_off_curve_and_stable() {
        let vault = Pubkey::new_from_array([7u8; 32]);
        let id = [3u8; 32];

        let a = deposit_address(&program(), &vault, &id).unwrap();
        let b = deposit_address(&program(), &vault, &id).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_on_curve());

        let (expected, bump) =
            Pubkey::find_program_address(&[VAULT_DEPOSIT_SEED, vault.as_ref(), &id], &program());
        assert_eq!(a, expected);
        let direct = Pubkey::create_program_address(
            &[VAULT_DEPOSIT_SEED, vault.as_ref(), &id, &[bump]],
            &program(),
        )
        .unwrap();
        assert_eq!(direct, a);
    }

    #[test]
    fn different_ids_give_different_accounts() {
        let vault = Pubkey::new_from_array([2u8; 32]);
        let a = deposit_address(&program(), &vault, &[0u8; 32]).unwrap();
        let b = deposit_address(&program(), &vault, &[1u8; 32]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn vault_is_part_of_the_seed() {
        let id = [5u8; 32];
        let a = deposit_address(&program(), &Pubkey::new_from_array([1u8; 32]), &id).unwrap();
        let b = deposit_address(&program(), &Pubkey::new_from_array([2u8; 32]), &id).unwrap();
        assert_ne!(a, b);
    }
}
